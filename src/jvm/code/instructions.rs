//! This module contains the AST of JVM bytecode. The representation is slightly different from
//! the usual presentation to make it more convenient to analyze and rewrite bytecode. For instance:
//!
//!   - The "wide" instruction doesn't show up at all, but instead gets merged into the
//!     instructions it is allowed to modify
//!
//!   - Some instructions (like the branches) get abstracted into one instruction with a field.
//!     This helps with repetitive pattern matches.
//!
//!   - Jump targets are symbolic [`Label`]s, placed in the instruction stream by the
//!     [`Instruction::Label`] pseudo-instruction (much like a `LabelNode` in ASM's tree API)
//!
//!   - Some instructions (like `jsr` and `ret`) are just omitted. Class files from version 51 on
//!     cannot contain them.

use super::Label;
use crate::jvm::{BaseType, BinaryName, FieldType, MethodDescriptor, RefType, UnqualifiedName};
use crate::util::Width;

/// Reference to a field
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: FieldType,
}

/// Reference to a method
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: BinaryName,
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
}

impl MethodRef {
    /// Is this an instance initializer?
    pub fn is_init(&self) -> bool {
        self.name.is_init()
    }
}

/// Call site of an `invokedynamic`
///
/// The bootstrap method and its static arguments are kept opaque: nothing here needs to look
/// inside them, but they must survive being copied into a new routine.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndyCall {
    pub name: UnqualifiedName,
    pub descriptor: MethodDescriptor,
    pub bootstrap: String,
}

/// Loadable constant (operand of `ldc`, `ldc_w`, and `ldc2_w`)
#[derive(Clone, Debug, PartialEq)]
pub enum Constant {
    Integer(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    String(String),
    Class(RefType),
}

impl Constant {
    /// Kind of the value pushed by loading the constant
    pub fn kind(&self) -> ValueKind {
        match self {
            Constant::Integer(_) => ValueKind::Int,
            Constant::Float(_) => ValueKind::Float,
            Constant::Long(_) => ValueKind::Long,
            Constant::Double(_) => ValueKind::Double,
            Constant::String(_) | Constant::Class(_) => ValueKind::Reference,
        }
    }
}

/// Computational kind of a value on the stack or in a local
///
/// `boolean`, `byte`, `char`, and `short` are all `int` as far as the stack is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Long,
    Double,
    Reference,
}

impl ValueKind {
    pub fn of(field_type: &FieldType) -> ValueKind {
        match field_type {
            FieldType::Base(BaseType::Long) => ValueKind::Long,
            FieldType::Base(BaseType::Float) => ValueKind::Float,
            FieldType::Base(BaseType::Double) => ValueKind::Double,
            FieldType::Base(_) => ValueKind::Int,
            FieldType::Ref(_) => ValueKind::Reference,
        }
    }

    /// Most natural field type with this kind (used for boxing)
    pub fn field_type(&self) -> FieldType {
        match self {
            ValueKind::Int => FieldType::int(),
            ValueKind::Float => FieldType::float(),
            ValueKind::Long => FieldType::long(),
            ValueKind::Double => FieldType::double(),
            ValueKind::Reference => FieldType::object(BinaryName::OBJECT),
        }
    }
}

impl Width for ValueKind {
    fn width(&self) -> usize {
        match self {
            ValueKind::Long | ValueKind::Double => 2,
            _ => 1,
        }
    }
}

/// JVM bytecode instruction
#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    /// Pseudo-instruction marking the position of a label
    Label(Label),

    Nop,
    AConstNull,
    IConstM1,
    IConst0,
    IConst1,
    IConst2,
    IConst3,
    IConst4,
    IConst5,
    LConst0,
    LConst1,
    FConst0,
    FConst1,
    FConst2,
    DConst0,
    DConst1,
    BiPush(i8),
    SiPush(i16),
    Ldc(Constant), // covers `ldc`, `ldc_w`, and `ldc2_w`
    ILoad(u16),    // covers `iload`, `iload{0,3}`, and `wide iload`
    LLoad(u16),
    FLoad(u16),
    DLoad(u16),
    ALoad(u16),
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    SALoad,
    IStore(u16), // covers `istore`, `istore{0,3}`, and `wide istore`
    LStore(u16),
    FStore(u16),
    DStore(u16),
    AStore(u16),
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    SAStore,
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    ISh(ShiftType), // covers `ishr`, `ishl`, and `iushr`
    LSh(ShiftType), // covers `lshr`, `lshl`, and `lushr`
    IAnd,
    LAnd,
    IOr,
    LOr,
    IXor,
    LXor,
    IInc(u16, i16), // covers `iinc` and `wide iinc`
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2B,
    I2C,
    I2S,
    LCmp,
    FCmp(CompareMode), // covers `fcmpl` and `fcmpg`
    DCmp(CompareMode), // covers `dcmpl` and `dcmpg`
    If(OrdComparison, Label), // covers `ifeq`, `ifne`, `iflt`, `ifge`, `ifgt`, `ifle`
    IfICmp(OrdComparison, Label), // covers `if_icmpeq`, `if_icmpne`, ... `if_icmple`
    IfACmp(EqComparison, Label), // covers `if_acmpeq`, `if_acmpne`
    IfNull(EqComparison, Label), // covers `ifnull`, `ifnonnull`
    Goto(Label),                 // covers `goto` and `goto_w`
    TableSwitch {
        /// Jump target if the argument is less than `low` or greater than
        /// `low + targets.len()`
        default: Label,

        /// Value associated with the first jump target
        low: i32,

        /// Jump targets
        targets: Vec<Label>,
    },
    LookupSwitch {
        /// Jump target if there is no corresponding key
        default: Label,

        /// Jump targets (sorted so that the keys are ascending)
        targets: Vec<(i32, Label)>,
    },
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    GetStatic(FieldRef),
    PutStatic(FieldRef),
    GetField(FieldRef),
    PutField(FieldRef),
    Invoke(InvokeType, MethodRef),
    InvokeDynamic(IndyCall),
    New(BinaryName),
    NewArray(BaseType),
    ANewArray(RefType),
    ArrayLength,
    AThrow,
    CheckCast(RefType),
    InstanceOf(RefType),
    MonitorEnter,
    MonitorExit,
    MultiANewArray(RefType, u8),
}

impl Instruction {
    /// Load of a local variable (the slot and kind of value loaded)
    pub fn local_load(&self) -> Option<(ValueKind, u16)> {
        match self {
            Instruction::ILoad(slot) => Some((ValueKind::Int, *slot)),
            Instruction::LLoad(slot) => Some((ValueKind::Long, *slot)),
            Instruction::FLoad(slot) => Some((ValueKind::Float, *slot)),
            Instruction::DLoad(slot) => Some((ValueKind::Double, *slot)),
            Instruction::ALoad(slot) => Some((ValueKind::Reference, *slot)),
            _ => None,
        }
    }

    /// Write to a local variable (the slot and kind of value written)
    ///
    /// `iinc` counts: it reads and then writes its slot.
    pub fn local_store(&self) -> Option<(ValueKind, u16)> {
        match self {
            Instruction::IStore(slot) | Instruction::IInc(slot, _) => Some((ValueKind::Int, *slot)),
            Instruction::LStore(slot) => Some((ValueKind::Long, *slot)),
            Instruction::FStore(slot) => Some((ValueKind::Float, *slot)),
            Instruction::DStore(slot) => Some((ValueKind::Double, *slot)),
            Instruction::AStore(slot) => Some((ValueKind::Reference, *slot)),
            _ => None,
        }
    }

    /// Method call (not including `invokedynamic`, which has no receiver or target class)
    pub fn method_call(&self) -> Option<(InvokeType, &MethodRef)> {
        match self {
            Instruction::Invoke(invoke_type, method) => Some((*invoke_type, method)),
            _ => None,
        }
    }

    /// Is this a call to an instance initializer (`invokespecial <init>`)?
    pub fn is_initializer_call(&self) -> bool {
        matches!(self, Instruction::Invoke(InvokeType::Special, method) if method.is_init())
    }

    /// Local variable slots touched (read or written) by the instruction, along with the number
    /// of slots the value occupies
    pub fn local_slots(&self) -> Option<(u16, usize)> {
        self.local_load()
            .or_else(|| self.local_store())
            .map(|(kind, slot)| (slot, kind.width()))
    }

    /// Labels this instruction may jump to (not including fall through)
    pub fn jump_targets(&self) -> Vec<Label> {
        match self {
            Instruction::If(_, lbl)
            | Instruction::IfICmp(_, lbl)
            | Instruction::IfACmp(_, lbl)
            | Instruction::IfNull(_, lbl)
            | Instruction::Goto(lbl) => vec![*lbl],
            Instruction::TableSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().copied());
                ts
            }
            Instruction::LookupSwitch {
                default, targets, ..
            } => {
                let mut ts = vec![*default];
                ts.extend(targets.iter().map(|(_, target)| *target));
                ts
            }
            _ => vec![],
        }
    }

    /// Can control continue on to the next instruction in the stream?
    pub fn falls_through(&self) -> bool {
        !matches!(
            self,
            Instruction::Goto(_)
                | Instruction::TableSwitch { .. }
                | Instruction::LookupSwitch { .. }
                | Instruction::IReturn
                | Instruction::LReturn
                | Instruction::FReturn
                | Instruction::DReturn
                | Instruction::AReturn
                | Instruction::Return
                | Instruction::AThrow
        )
    }

    /// Load a local of the given kind
    pub fn load(kind: ValueKind, slot: u16) -> Instruction {
        match kind {
            ValueKind::Int => Instruction::ILoad(slot),
            ValueKind::Float => Instruction::FLoad(slot),
            ValueKind::Long => Instruction::LLoad(slot),
            ValueKind::Double => Instruction::DLoad(slot),
            ValueKind::Reference => Instruction::ALoad(slot),
        }
    }

    /// Store a local of the given kind
    pub fn store(kind: ValueKind, slot: u16) -> Instruction {
        match kind {
            ValueKind::Int => Instruction::IStore(slot),
            ValueKind::Float => Instruction::FStore(slot),
            ValueKind::Long => Instruction::LStore(slot),
            ValueKind::Double => Instruction::DStore(slot),
            ValueKind::Reference => Instruction::AStore(slot),
        }
    }
}

/// Instructions that take no operands, along with their mnemonics
pub const ZERO_OPERAND_INSTRUCTIONS: [(&str, Instruction); 107] = [
    ("nop", Instruction::Nop),
    ("aconst_null", Instruction::AConstNull),
    ("iconst_m1", Instruction::IConstM1),
    ("iconst_0", Instruction::IConst0),
    ("iconst_1", Instruction::IConst1),
    ("iconst_2", Instruction::IConst2),
    ("iconst_3", Instruction::IConst3),
    ("iconst_4", Instruction::IConst4),
    ("iconst_5", Instruction::IConst5),
    ("lconst_0", Instruction::LConst0),
    ("lconst_1", Instruction::LConst1),
    ("fconst_0", Instruction::FConst0),
    ("fconst_1", Instruction::FConst1),
    ("fconst_2", Instruction::FConst2),
    ("dconst_0", Instruction::DConst0),
    ("dconst_1", Instruction::DConst1),
    ("iaload", Instruction::IALoad),
    ("laload", Instruction::LALoad),
    ("faload", Instruction::FALoad),
    ("daload", Instruction::DALoad),
    ("aaload", Instruction::AALoad),
    ("baload", Instruction::BALoad),
    ("caload", Instruction::CALoad),
    ("saload", Instruction::SALoad),
    ("iastore", Instruction::IAStore),
    ("lastore", Instruction::LAStore),
    ("fastore", Instruction::FAStore),
    ("dastore", Instruction::DAStore),
    ("aastore", Instruction::AAStore),
    ("bastore", Instruction::BAStore),
    ("castore", Instruction::CAStore),
    ("sastore", Instruction::SAStore),
    ("pop", Instruction::Pop),
    ("pop2", Instruction::Pop2),
    ("dup", Instruction::Dup),
    ("dup_x1", Instruction::DupX1),
    ("dup_x2", Instruction::DupX2),
    ("dup2", Instruction::Dup2),
    ("dup2_x1", Instruction::Dup2X1),
    ("dup2_x2", Instruction::Dup2X2),
    ("swap", Instruction::Swap),
    ("iadd", Instruction::IAdd),
    ("ladd", Instruction::LAdd),
    ("fadd", Instruction::FAdd),
    ("dadd", Instruction::DAdd),
    ("isub", Instruction::ISub),
    ("lsub", Instruction::LSub),
    ("fsub", Instruction::FSub),
    ("dsub", Instruction::DSub),
    ("imul", Instruction::IMul),
    ("lmul", Instruction::LMul),
    ("fmul", Instruction::FMul),
    ("dmul", Instruction::DMul),
    ("idiv", Instruction::IDiv),
    ("ldiv", Instruction::LDiv),
    ("fdiv", Instruction::FDiv),
    ("ddiv", Instruction::DDiv),
    ("irem", Instruction::IRem),
    ("lrem", Instruction::LRem),
    ("frem", Instruction::FRem),
    ("drem", Instruction::DRem),
    ("ineg", Instruction::INeg),
    ("lneg", Instruction::LNeg),
    ("fneg", Instruction::FNeg),
    ("dneg", Instruction::DNeg),
    ("ishl", Instruction::ISh(ShiftType::Left)),
    ("lshl", Instruction::LSh(ShiftType::Left)),
    ("ishr", Instruction::ISh(ShiftType::ArithmeticRight)),
    ("lshr", Instruction::LSh(ShiftType::ArithmeticRight)),
    ("iushr", Instruction::ISh(ShiftType::LogicalRight)),
    ("lushr", Instruction::LSh(ShiftType::LogicalRight)),
    ("iand", Instruction::IAnd),
    ("land", Instruction::LAnd),
    ("ior", Instruction::IOr),
    ("lor", Instruction::LOr),
    ("ixor", Instruction::IXor),
    ("lxor", Instruction::LXor),
    ("i2l", Instruction::I2L),
    ("i2f", Instruction::I2F),
    ("i2d", Instruction::I2D),
    ("l2i", Instruction::L2I),
    ("l2f", Instruction::L2F),
    ("l2d", Instruction::L2D),
    ("f2i", Instruction::F2I),
    ("f2l", Instruction::F2L),
    ("f2d", Instruction::F2D),
    ("d2i", Instruction::D2I),
    ("d2l", Instruction::D2L),
    ("d2f", Instruction::D2F),
    ("i2b", Instruction::I2B),
    ("i2c", Instruction::I2C),
    ("i2s", Instruction::I2S),
    ("lcmp", Instruction::LCmp),
    ("fcmpl", Instruction::FCmp(CompareMode::L)),
    ("fcmpg", Instruction::FCmp(CompareMode::G)),
    ("dcmpl", Instruction::DCmp(CompareMode::L)),
    ("dcmpg", Instruction::DCmp(CompareMode::G)),
    ("ireturn", Instruction::IReturn),
    ("lreturn", Instruction::LReturn),
    ("freturn", Instruction::FReturn),
    ("dreturn", Instruction::DReturn),
    ("areturn", Instruction::AReturn),
    ("return", Instruction::Return),
    ("arraylength", Instruction::ArrayLength),
    ("athrow", Instruction::AThrow),
    ("monitorenter", Instruction::MonitorEnter),
    ("monitorexit", Instruction::MonitorExit),
];

/// Possible bit shifts
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ShiftType {
    Left,
    LogicalRight,
    ArithmeticRight,
}

/// Comparison modes for floating point
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum CompareMode {
    /// -1 on NaN
    L,

    /// 1 on NaN
    G,
}

/// Binary comparison operators available for `int` branches
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum OrdComparison {
    EQ,
    GE,
    GT,
    LE,
    LT,
    NE,
}

/// Equality/inequality comparison operators
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum EqComparison {
    EQ,
    NE,
}

/// Type of method to invoke
///
/// Note: `InvokeDynamic` is kept separate because it has no target class and no receiver.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum InvokeType {
    Virtual,
    Special,
    Static,
    Interface,
}

impl InvokeType {
    /// Does the call pop a receiver from beneath its arguments?
    pub fn has_receiver(&self) -> bool {
        !matches!(self, InvokeType::Static)
    }
}
