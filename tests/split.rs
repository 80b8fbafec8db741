mod common;

use common::{both_traces, single_routine, Value};
use ctorsplit::jvm::code::{Instruction, InvokeType};
use ctorsplit::jvm::{Name, RenderDescriptor};
use ctorsplit::split::SplitResult;
use ctorsplit::{deconstruct, Error, StructuralError};

/// `Child(int x) { super(x = 1, flag ? 3 : 7); use(x); }`
const CHILD: &str = r#"
.class com/example/Child
.method public <init>(I)V
    aload_0
    iconst_1
    dup
    istore_1                        # x = 1
    getstatic com/example/Child.flag Z
    ifeq L0
    iconst_3
    goto L1
L0:
    bipush 7
L1:
    invokespecial com/example/Base.<init> (II)V
    aload_0
    iload_1
    invokevirtual com/example/Child.use (I)V
    return
.end method
"#;

fn split(source: &str) -> SplitResult {
    let routine = single_routine(source).unwrap();
    deconstruct(&routine.owner, &routine).unwrap()
}

fn structural_error(source: &str) -> StructuralError {
    let routine = single_routine(source).unwrap();
    match deconstruct(&routine.owner, &routine) {
        Err(Error::Structural(err)) => err,
        other => panic!("expected a structural error, got {:?}", other),
    }
}

#[test]
fn ternary_argument_with_assignment() {
    let routine = single_routine(CHILD).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();

    assert_eq!(split.self_load, 0);
    assert_eq!(split.delegation_position, 11);
    assert_eq!(split.delegation.class.as_str(), "com/example/Base");
    assert_eq!(split.delegation.descriptor.render(), "(II)V");

    let args = &split.args;
    assert_eq!(args.routine.name.as_str(), "init$args");
    assert_eq!(
        args.routine.descriptor.render(),
        "([Ljava/lang/Object;I)[Ljava/lang/Object;"
    );
    assert!(args.routine.is_static());
    assert_eq!(args.mirrored_slots, vec![1]);
    assert_eq!(args.result_slot, 2);

    // The store to `x` is immediately mirrored into the snapshot
    let store = args
        .routine
        .instructions
        .iter()
        .position(|insn| *insn == Instruction::IStore(1))
        .unwrap();
    let mirror = &args.routine.instructions[store + 1..store + 6];
    assert_eq!(mirror[0], Instruction::ALoad(0));
    assert_eq!(mirror[1], Instruction::IConst1);
    assert_eq!(mirror[2], Instruction::ILoad(1));
    match &mirror[3] {
        Instruction::Invoke(InvokeType::Static, method) => {
            assert_eq!(method.class.as_str(), "java/lang/Integer");
            assert_eq!(method.name.as_str(), "valueOf");
        }
        other => panic!("expected boxing, got {}", other),
    }
    assert_eq!(mirror[4], Instruction::AAStore);
    assert_eq!(
        args.routine.instructions.last(),
        Some(&Instruction::AReturn)
    );

    let body = &split.body;
    assert_eq!(body.routine.name.as_str(), "init$body");
    assert_eq!(
        body.routine.descriptor.render(),
        "(Lcom/example/Child;I)V"
    );
    assert_eq!(body.slot_shift, 0);
    assert_eq!(body.routine.instructions, routine.instructions[12..].to_vec());

    for (flag, chosen) in [(1, 3), (0, 7)] {
        let (original, reconstructed) = both_traces(
            &routine,
            &split,
            &[("com/example/Child.flag", Value::Int(flag))],
            &[Value::Int(5)],
        )
        .unwrap();
        assert_eq!(
            original,
            vec![
                format!("chain com/example/Base.<init>(II)V(1, {})", chosen),
                "call com/example/Child.use(I)V(this, 1)".to_owned(),
                "state com/example/Child{}".to_owned(),
            ]
        );
        assert_eq!(original, reconstructed);
    }
}

#[test]
fn side_effects_keep_their_order() {
    let source = r#"
.class com/example/Counter
.method public <init>(I)V
    aload_0
    ldc "first"
    invokestatic com/example/Log.note (Ljava/lang/String;)I
    iload_1
    iinc 1 1
    invokespecial com/example/Base.<init> (II)V
    aload_0
    iload_1
    putfield com/example/Counter.count I
    ldc "second"
    invokestatic com/example/Log.note (Ljava/lang/String;)I
    pop
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();
    assert_eq!(split.args.mirrored_slots, vec![1]);

    let (original, reconstructed) = both_traces(&routine, &split, &[], &[Value::Int(5)]).unwrap();
    assert_eq!(
        original,
        vec![
            "call com/example/Log.note(Ljava/lang/String;)I(\"first\")",
            "chain com/example/Base.<init>(II)V(0, 5)",
            "call com/example/Log.note(Ljava/lang/String;)I(\"second\")",
            "state com/example/Counter{count=6}",
        ]
    );
    assert_eq!(original, reconstructed);
}

#[test]
fn assignment_on_one_branch() {
    // `Child(int x) { super(flag ? (x = 1) : 7); use(x); }`
    let source = r#"
.class com/example/Child
.method public <init>(I)V
    aload_0
    getstatic com/example/Child.flag Z
    ifeq L0
    iconst_1
    dup
    istore_1
    goto L1
L0:
    bipush 7
L1:
    invokespecial com/example/Base.<init> (I)V
    aload_0
    iload_1
    invokevirtual com/example/Child.use (I)V
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();
    assert_eq!(split.args.mirrored_slots, vec![1]);

    for (flag, argument, seen) in [(1, 1, 1), (0, 7, 5)] {
        let (original, reconstructed) = both_traces(
            &routine,
            &split,
            &[("com/example/Child.flag", Value::Int(flag))],
            &[Value::Int(5)],
        )
        .unwrap();
        assert_eq!(
            original,
            vec![
                format!("chain com/example/Base.<init>(I)V({})", argument),
                format!("call com/example/Child.use(I)V(this, {})", seen),
                "state com/example/Child{}".to_owned(),
            ]
        );
        assert_eq!(original, reconstructed);
    }
}

#[test]
fn increment_on_one_branch() {
    let source = r#"
.class com/example/Counter
.method public <init>(I)V
    aload_0
    iload_1
    ifle L0
    iinc 1 -1
L0:
    iload_1
    invokespecial com/example/Base.<init> (I)V
    aload_0
    iload_1
    putfield com/example/Counter.count I
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();
    assert_eq!(split.args.mirrored_slots, vec![1]);

    for (count, after) in [(5, 4), (0, 0)] {
        let (original, reconstructed) =
            both_traces(&routine, &split, &[], &[Value::Int(count)]).unwrap();
        assert_eq!(
            original,
            vec![
                format!("chain com/example/Base.<init>(I)V({})", after),
                format!("state com/example/Counter{{count={}}}", after),
            ]
        );
        assert_eq!(original, reconstructed);
    }
}

#[test]
fn wide_arguments() {
    let source = r#"
.class com/example/Wide
.method public <init>(J)V
    aload_0
    lload_1
    ldc 2L
    ladd
    dup2
    lstore_1
    invokespecial com/example/Base.<init> (J)V
    aload_0
    lload_1
    invokevirtual com/example/Wide.use (J)V
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();
    assert_eq!(split.args.mirrored_slots, vec![1]);
    assert_eq!(split.args.result_slot, 3);

    let (original, reconstructed) =
        both_traces(&routine, &split, &[], &[Value::Long(5)]).unwrap();
    assert_eq!(
        original,
        vec![
            "chain com/example/Base.<init>(J)V(7L)",
            "call com/example/Wide.use(J)V(this, 7L)",
            "state com/example/Wide{}",
        ]
    );
    assert_eq!(original, reconstructed);
}

#[test]
fn field_writes_before_the_chaining_call() {
    let source = r#"
.class com/example/Outer$Inner
.method <init>(Lcom/example/Outer;)V
    aload_0
    aload_1
    putfield com/example/Outer$Inner.this$0 Lcom/example/Outer;
    aload_0
    invokespecial java/lang/Object.<init> ()V
    aload_0
    invokevirtual com/example/Outer$Inner.setup ()V
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let split = deconstruct(&routine.owner, &routine).unwrap();
    assert_eq!(split.self_load, 3);
    assert_eq!(split.delegation_position, 4);
    assert!(split.args.mirrored_slots.is_empty());

    let (original, reconstructed) = both_traces(&routine, &split, &[], &[Value::Null]).unwrap();
    assert_eq!(
        original,
        vec![
            "chain java/lang/Object.<init>()V()",
            "call com/example/Outer$Inner.setup()V(this)",
            "state com/example/Outer$Inner{this$0=null}",
        ]
    );
    assert_eq!(original, reconstructed);
}

#[test]
fn body_exception_handlers() {
    let source = r#"
.class com/example/Child
.method public <init>()V
    aload_0
    invokespecial com/example/Base.<init> ()V
L0:
    aload_0
    invokevirtual com/example/Child.risky ()V
L1:
    return
L2:
    pop
    return
.catch java/lang/Exception from L0 to L1 using L2
.end method
"#;
    let split = split(source);
    assert!(split.args.routine.handlers.is_empty());
    assert_eq!(split.body.routine.handlers.len(), 1);
}

#[test]
fn leaked_self_is_rejected() {
    let source = r#"
.class com/example/Leaky
.method public <init>()V
    aload_0
    aload_0
    invokestatic com/example/Registry.register (Ljava/lang/Object;)V
    invokespecial com/example/Base.<init> ()V
    return
.end method
"#;
    let err = structural_error(source);
    assert_eq!(err, StructuralError::SelfEscaped { self_load: 1, call: 3 });
    assert_eq!(err.to_string(), "self reference escaped before chaining call");
}

#[test]
fn missing_chaining_call() {
    let source = r#"
.class com/example/Odd
.method public <init>()V
    aload_0
    pop
    return
.end method
"#;
    let err = structural_error(source);
    assert_eq!(err, StructuralError::NoChainingCall);
    assert_eq!(err.to_string(), "no chaining call found");
}

#[test]
fn split_routines_cannot_be_split_again() {
    let split = split(CHILD);
    let owner = &split.args.routine.owner;

    for routine in [&split.args.routine, &split.body.routine] {
        match deconstruct(owner, routine) {
            Err(err) => {
                assert!(err.is_structural());
                assert_eq!(err.to_string(), "no chaining call found");
            }
            Ok(result) => panic!("{} was split again: {:?}", routine.name.as_str(), result),
        }
    }
}

#[test]
fn second_chaining_call() {
    let source = r#"
.class com/example/Twice
.method public <init>()V
    aload_0
    invokespecial com/example/Base.<init> ()V
    aload_0
    invokespecial com/example/Base.<init> ()V
    return
.end method
"#;
    assert_eq!(
        structural_error(source),
        StructuralError::MultipleChainingCalls {
            first: 1,
            second: 3
        }
    );
}

#[test]
fn values_below_self() {
    let source = r#"
.class com/example/Child
.method public <init>()V
    aconst_null
    aload_0
    invokespecial com/example/Base.<init> ()V
    pop
    return
.end method
"#;
    assert_eq!(
        structural_error(source),
        StructuralError::NonEmptyStack {
            self_load: 1,
            depth: 1
        }
    );
}

#[test]
fn jump_out_of_the_arguments() {
    let source = r#"
.class com/example/Child
.method public <init>(I)V
    aload_0
    iload_1
    ifeq L0
    invokespecial com/example/Base.<init> ()V
    aload_0
L0:
    invokevirtual com/example/Child.use ()V
    return
.end method
"#;
    match structural_error(source) {
        StructuralError::BranchLeavesSegment { position, target } => {
            assert_eq!(position, 2);
            assert_eq!(target.0, 0);
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn handler_around_the_chaining_call() {
    let source = r#"
.class com/example/Child
.method public <init>()V
    aload_0
L0:
    iconst_1
    invokespecial com/example/Base.<init> (I)V
L1:
    return
L2:
    pop
    return
.catch any from L0 to L1 using L2
.end method
"#;
    assert!(matches!(
        structural_error(source),
        StructuralError::HandlerStraddlesSplit { .. }
    ));
}

#[test]
fn arguments_overwrite_local_zero() {
    let source = r#"
.class com/example/Child
.method public <init>()V
    aload_0
    aconst_null
    astore_0
    invokespecial com/example/Base.<init> ()V
    return
.end method
"#;
    assert_eq!(
        structural_error(source),
        StructuralError::SnapshotSlotClobbered { position: 2 }
    );
}

#[test]
fn body_reads_local_set_by_arguments() {
    let source = r#"
.class com/example/Child
.method public <init>()V
    aload_0
    iconst_2
    istore_1
    iload_1
    invokespecial com/example/Base.<init> (I)V
    aload_0
    iload_1
    invokevirtual com/example/Child.use (I)V
    return
.end method
"#;
    match structural_error(source) {
        StructuralError::FragmentNotSelfContained {
            fragment,
            position,
            kind,
        } => {
            assert_eq!(fragment.as_str(), "init$body");
            assert_eq!(position, 1);
            assert_eq!(kind, ctorsplit::AnalysisErrorKind::UninitializedLocal(1));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
fn malformed_code_is_not_structural() {
    let source = r#"
.class com/example/Broken
.method public <init>()V
    aload_0
    iadd
    return
.end method
"#;
    let routine = single_routine(source).unwrap();
    let err = deconstruct(&routine.owner, &routine).unwrap_err();
    assert!(!err.is_structural());
    assert!(matches!(err, Error::Analysis { position: 1, .. }));
}
