use super::rewrite::{rewrite, CodeEmitter};
use super::ArgsRoutine;
use crate::jvm::code::{ExceptionHandler, Instruction, MethodRef, Routine, ValueKind};
use crate::jvm::{
    BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, RefType, UnqualifiedName,
};
use std::collections::{BTreeMap, HashMap};

/// Build `init$args` out of the code strictly between the self load and the chaining call
///
/// The code is replayed as is, except that every write to a local is mirrored into the snapshot
/// array (local 0, where `this` used to be). Written parameters are mirrored once more after the
/// replay, since a store may only run on some paths. Then the chaining call's arguments, which are
/// left on the stack, get boxed into a fresh `Object[]` (in order) and returned.
pub fn build_args_routine(
    owner: &BinaryName,
    routine: &Routine,
    self_load: usize,
    call: usize,
    delegation: &MethodRef,
    handlers: Vec<ExceptionHandler>,
) -> ArgsRoutine {
    let result_slot = routine.max_locals() as u16;
    let parameter_types: HashMap<u16, &FieldType> = routine.parameter_slots().into_iter().collect();
    let object = FieldType::object(BinaryName::OBJECT);

    let mut mirrored_slots = vec![];

    // Parameters written by the argument code, and whether every write kept the declared kind
    let mut written_parameters: BTreeMap<u16, bool> = BTreeMap::new();

    let mut code: Vec<Instruction> = vec![];
    rewrite(
        &routine.instructions[self_load + 1..call],
        &mut code,
        |insn, code| {
            if let Some((kind, slot)) = insn.local_store() {
                // Box using the declared type if this is a parameter (so a `boolean` is a `Boolean`)
                let field_type = match parameter_types.get(&slot) {
                    Some(parameter) => {
                        let same_kind = ValueKind::of(parameter) == kind;
                        *written_parameters.entry(slot).or_insert(true) &= same_kind;
                        if same_kind {
                            (*parameter).clone()
                        } else {
                            kind.field_type()
                        }
                    }
                    None => kind.field_type(),
                };
                mirror_local(code, slot, &field_type);
                mirrored_slots.push(slot);
            }
        },
    );

    // Paths that skipped a store still have to hand the parameter back
    for (slot, same_kind) in written_parameters {
        if let (true, Some(parameter)) = (same_kind, parameter_types.get(&slot)) {
            mirror_local(&mut code, slot, parameter);
        }
    }

    // Pack the arguments, last one first
    let arguments = &delegation.descriptor.parameters;
    code.const_int(arguments.len() as i32);
    code.push_instruction(Instruction::ANewArray(RefType::Object(BinaryName::OBJECT)));
    code.push_instruction(Instruction::AStore(result_slot));
    for (index, argument) in arguments.iter().enumerate().rev() {
        code.push_instruction(Instruction::ALoad(result_slot));
        code.swap(argument, &object);
        code.const_int(index as i32);
        code.swap(argument, &FieldType::int());
        code.box_value(argument);
        code.push_instruction(Instruction::AAStore);
    }
    code.push_instruction(Instruction::ALoad(result_slot));
    code.push_instruction(Instruction::AReturn);

    mirrored_slots.sort_unstable();
    mirrored_slots.dedup();

    let object_array = FieldType::array(object);
    let mut parameters = vec![object_array.clone()];
    parameters.extend(routine.descriptor.parameters.iter().cloned());

    ArgsRoutine {
        routine: Routine {
            owner: owner.clone(),
            name: UnqualifiedName::INIT_ARGS,
            descriptor: MethodDescriptor {
                parameters,
                return_type: Some(object_array),
            },
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            exceptions: routine.exceptions.clone(),
            instructions: code,
            handlers,
        },
        mirrored_slots,
        result_slot,
    }
}

/// Store the boxed value of a local into the snapshot array: `aload 0; push slot; ?load slot; box;
/// aastore`
fn mirror_local<E: CodeEmitter>(code: &mut E, slot: u16, field_type: &FieldType) {
    code.push_instruction(Instruction::ALoad(0));
    code.const_int(slot as i32);
    code.get_local(slot, field_type);
    code.box_value(field_type);
    code.push_instruction(Instruction::AAStore);
}
