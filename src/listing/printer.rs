use super::Listing;
use crate::jvm::code::{
    Constant, EqComparison, Instruction, InvokeType, OrdComparison, Routine,
    ZERO_OPERAND_INSTRUCTIONS,
};
use crate::jvm::{BaseType, RenderDescriptor};
use std::fmt;

impl fmt::Display for Listing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut current_owner = None;
        for routine in &self.routines {
            if current_owner != Some(&routine.owner) {
                writeln!(f, ".class {}", routine.owner)?;
                current_owner = Some(&routine.owner);
            }
            write!(f, "{}", routine)?;
        }
        Ok(())
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(".method")?;
        for keyword in self.access_flags.keywords() {
            write!(f, " {}", keyword)?;
        }
        writeln!(f, " {}{}", self.name, self.descriptor.render())?;

        for exception in &self.exceptions {
            writeln!(f, ".throws {}", exception)?;
        }

        for insn in &self.instructions {
            match insn {
                Instruction::Label(_) => writeln!(f, "{}", insn)?,
                _ => writeln!(f, "    {}", insn)?,
            }
        }

        for handler in &self.handlers {
            match &handler.catch_type {
                Some(catch_type) => write!(f, ".catch {}", catch_type)?,
                None => f.write_str(".catch any")?,
            }
            writeln!(
                f,
                " from {} to {} using {}",
                handler.start, handler.end, handler.handler
            )?;
        }

        writeln!(f, ".end method")
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction::*;

        if let Some((mnemonic, _)) = ZERO_OPERAND_INSTRUCTIONS.iter().find(|(_, i)| i == self) {
            return f.write_str(mnemonic);
        }

        match self {
            Label(label) => write!(f, "{}:", label),
            BiPush(byte) => write!(f, "bipush {}", byte),
            SiPush(short) => write!(f, "sipush {}", short),
            Ldc(constant) => write!(f, "ldc {}", Literal(constant)),

            ILoad(slot) => write!(f, "iload {}", slot),
            LLoad(slot) => write!(f, "lload {}", slot),
            FLoad(slot) => write!(f, "fload {}", slot),
            DLoad(slot) => write!(f, "dload {}", slot),
            ALoad(slot) => write!(f, "aload {}", slot),
            IStore(slot) => write!(f, "istore {}", slot),
            LStore(slot) => write!(f, "lstore {}", slot),
            FStore(slot) => write!(f, "fstore {}", slot),
            DStore(slot) => write!(f, "dstore {}", slot),
            AStore(slot) => write!(f, "astore {}", slot),
            IInc(slot, delta) => write!(f, "iinc {} {}", slot, delta),

            If(comparison, label) => write!(f, "if{} {}", ord_suffix(comparison), label),
            IfICmp(comparison, label) => {
                write!(f, "if_icmp{} {}", ord_suffix(comparison), label)
            }
            IfACmp(EqComparison::EQ, label) => write!(f, "if_acmpeq {}", label),
            IfACmp(EqComparison::NE, label) => write!(f, "if_acmpne {}", label),
            IfNull(EqComparison::EQ, label) => write!(f, "ifnull {}", label),
            IfNull(EqComparison::NE, label) => write!(f, "ifnonnull {}", label),
            Goto(label) => write!(f, "goto {}", label),
            TableSwitch {
                default,
                low,
                targets,
            } => {
                write!(f, "tableswitch {}", low)?;
                for target in targets {
                    write!(f, " {}", target)?;
                }
                write!(f, " default {}", default)
            }
            LookupSwitch { default, targets } => {
                f.write_str("lookupswitch")?;
                for (key, target) in targets {
                    write!(f, " {}:{}", key, target)?;
                }
                write!(f, " default {}", default)
            }

            GetStatic(field) | PutStatic(field) | GetField(field) | PutField(field) => {
                let mnemonic = match self {
                    GetStatic(_) => "getstatic",
                    PutStatic(_) => "putstatic",
                    GetField(_) => "getfield",
                    _ => "putfield",
                };
                write!(
                    f,
                    "{} {}.{} {}",
                    mnemonic,
                    field.class,
                    field.name,
                    field.descriptor.render()
                )
            }
            Invoke(invoke_type, method) => {
                let mnemonic = match invoke_type {
                    InvokeType::Virtual => "invokevirtual",
                    InvokeType::Special => "invokespecial",
                    InvokeType::Static => "invokestatic",
                    InvokeType::Interface => "invokeinterface",
                };
                write!(
                    f,
                    "{} {}.{} {}",
                    mnemonic,
                    method.class,
                    method.name,
                    method.descriptor.render()
                )
            }
            InvokeDynamic(call) => write!(
                f,
                "invokedynamic {} {} {}",
                call.name,
                call.descriptor.render(),
                call.bootstrap
            ),

            New(class) => write!(f, "new {}", class),
            NewArray(base_type) => write!(f, "newarray {}", base_type_keyword(base_type)),
            ANewArray(ref_type) => write!(f, "anewarray {}", ref_type.render_class_operand()),
            CheckCast(ref_type) => write!(f, "checkcast {}", ref_type.render_class_operand()),
            InstanceOf(ref_type) => write!(f, "instanceof {}", ref_type.render_class_operand()),
            MultiANewArray(ref_type, dimensions) => write!(
                f,
                "multianewarray {} {}",
                ref_type.render_class_operand(),
                dimensions
            ),

            // Everything else has no operands and was handled above
            other => write!(f, "{:?}", other),
        }
    }
}

/// Literal operand of `ldc`
struct Literal<'a>(&'a Constant);

impl<'a> fmt::Display for Literal<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Constant::Integer(integer) => write!(f, "{}", integer),
            Constant::Long(long) => write!(f, "{}L", long),
            Constant::Float(float) => write!(f, "{:?}F", float),
            Constant::Double(double) => write!(f, "{:?}D", double),
            Constant::Class(ref_type) => write!(f, "class {}", ref_type.render_class_operand()),
            Constant::String(string) => {
                f.write_str("\"")?;
                for c in string.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\r' => f.write_str("\\r")?,
                        '\t' => f.write_str("\\t")?,
                        c if c.is_control() => write!(f, "\\u{{{:x}}}", c as u32)?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
        }
    }
}

pub(super) fn ord_suffix(comparison: &OrdComparison) -> &'static str {
    match comparison {
        OrdComparison::EQ => "eq",
        OrdComparison::NE => "ne",
        OrdComparison::LT => "lt",
        OrdComparison::GE => "ge",
        OrdComparison::GT => "gt",
        OrdComparison::LE => "le",
    }
}

pub(super) fn base_type_keyword(base_type: &BaseType) -> &'static str {
    match base_type {
        BaseType::Boolean => "boolean",
        BaseType::Char => "char",
        BaseType::Float => "float",
        BaseType::Double => "double",
        BaseType::Byte => "byte",
        BaseType::Short => "short",
        BaseType::Int => "int",
        BaseType::Long => "long",
    }
}

pub(super) const BASE_TYPES: [BaseType; 8] = [
    BaseType::Boolean,
    BaseType::Char,
    BaseType::Float,
    BaseType::Double,
    BaseType::Byte,
    BaseType::Short,
    BaseType::Int,
    BaseType::Long,
];

pub(super) const ORD_COMPARISONS: [OrdComparison; 6] = [
    OrdComparison::EQ,
    OrdComparison::NE,
    OrdComparison::LT,
    OrdComparison::GE,
    OrdComparison::GT,
    OrdComparison::LE,
];
