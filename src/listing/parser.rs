use super::printer::{base_type_keyword, ord_suffix, BASE_TYPES, ORD_COMPARISONS};
use super::{Listing, ListingError};
use crate::jvm::code::{
    Constant, EqComparison, ExceptionHandler, FieldRef, IndyCall, Instruction, InvokeType, Label,
    MethodRef, Routine, ZERO_OPERAND_INSTRUCTIONS,
};
use crate::jvm::{
    BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, Name, ParseDescriptor, RefType,
    UnqualifiedName,
};

/// Parse a listing
pub fn parse(source: &str) -> Result<Listing, ListingError> {
    let mut parser = Parser::default();
    for (index, line) in source.lines().enumerate() {
        parser
            .line(line)
            .map_err(|message| ListingError {
                line: index + 1,
                message,
            })?;
    }

    if let Some(routine) = parser.current_routine {
        return Err(ListingError {
            line: source.lines().count(),
            message: format!("missing `.end method` for {}", routine.name),
        });
    }
    Ok(Listing {
        routines: parser.routines,
    })
}

#[derive(Default)]
struct Parser {
    routines: Vec<Routine>,
    current_owner: Option<BinaryName>,
    current_routine: Option<Routine>,
}

impl Parser {
    fn line(&mut self, line: &str) -> Result<(), String> {
        let line = strip_comment(line).trim();
        if line.is_empty() {
            return Ok(());
        }

        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            ".class" => {
                if self.current_routine.is_some() {
                    return Err("`.class` inside a method".to_owned());
                }
                self.current_owner = Some(BinaryName::from_str(rest)?);
            }
            ".method" => {
                if self.current_routine.is_some() {
                    return Err("`.method` inside a method".to_owned());
                }
                let owner = self
                    .current_owner
                    .clone()
                    .ok_or_else(|| "`.method` before any `.class`".to_owned())?;
                self.current_routine = Some(method_header(owner, rest)?);
            }
            ".throws" => {
                let exception = BinaryName::from_str(rest)?;
                self.routine()?.exceptions.push(exception);
            }
            ".catch" => {
                let handler = catch_directive(rest)?;
                self.routine()?.handlers.push(handler);
            }
            ".end" => {
                if rest != "method" {
                    return Err(format!("unknown directive `.end {}`", rest));
                }
                let routine = self
                    .current_routine
                    .take()
                    .ok_or_else(|| "`.end method` outside a method".to_owned())?;
                self.routines.push(routine);
            }
            _ if head.starts_with('.') => return Err(format!("unknown directive `{}`", head)),
            _ if head.ends_with(':') && rest.is_empty() => {
                let label = label(&head[..head.len() - 1])?;
                self.routine()?.instructions.push(Instruction::Label(label));
            }
            _ => {
                let insn = instruction(head, rest)?;
                self.routine()?.instructions.push(insn);
            }
        }
        Ok(())
    }

    fn routine(&mut self) -> Result<&mut Routine, String> {
        self.current_routine
            .as_mut()
            .ok_or_else(|| "expected to be inside a method".to_owned())
    }
}

/// Drop a trailing `#` comment (but not a `#` in a string literal)
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => (),
        }
    }
    line
}

/// Parse `<flags...> <name><descriptor>`
fn method_header(owner: BinaryName, rest: &str) -> Result<Routine, String> {
    let mut tokens: Vec<&str> = rest.split_whitespace().collect();
    let signature = tokens
        .pop()
        .ok_or_else(|| "missing method name and descriptor".to_owned())?;

    let mut access_flags = MethodAccessFlags::empty();
    for token in tokens {
        access_flags |= MethodAccessFlags::from_keyword(token)
            .ok_or_else(|| format!("unknown access flag `{}`", token))?;
    }

    let paren = signature
        .find('(')
        .ok_or_else(|| format!("missing descriptor in `{}`", signature))?;
    let name = UnqualifiedName::from_str(&signature[..paren])?;
    let descriptor = method_descriptor(&signature[paren..])?;

    Ok(Routine {
        owner,
        name,
        descriptor,
        access_flags,
        exceptions: vec![],
        instructions: vec![],
        handlers: vec![],
    })
}

/// Parse `<type or any> from <label> to <label> using <label>`
fn catch_directive(rest: &str) -> Result<ExceptionHandler, String> {
    match rest.split_whitespace().collect::<Vec<_>>()[..] {
        [catch_type, "from", start, "to", end, "using", handler] => Ok(ExceptionHandler {
            start: label(start)?,
            end: label(end)?,
            handler: label(handler)?,
            catch_type: match catch_type {
                "any" => None,
                class => Some(BinaryName::from_str(class)?),
            },
        }),
        _ => Err(format!("malformed `.catch {}`", rest)),
    }
}

fn label(token: &str) -> Result<Label, String> {
    token
        .strip_prefix('L')
        .and_then(|number| number.parse::<u32>().ok())
        .map(Label)
        .ok_or_else(|| format!("invalid label `{}`", token))
}

fn number<T: std::str::FromStr>(token: &str) -> Result<T, String> {
    token
        .parse::<T>()
        .map_err(|_| format!("invalid number `{}`", token))
}

fn method_descriptor(token: &str) -> Result<MethodDescriptor, String> {
    MethodDescriptor::parse(token).map_err(|err| format!("bad descriptor `{}`: {}", token, err))
}

fn field_descriptor(token: &str) -> Result<FieldType, String> {
    FieldType::parse(token).map_err(|err| format!("bad descriptor `{}`: {}", token, err))
}

fn class_operand(token: &str) -> Result<RefType, String> {
    RefType::parse_class_operand(token).map_err(|err| format!("bad class `{}`: {}", token, err))
}

/// Split `owner.name descriptor`
fn member<'a>(rest: &'a str) -> Result<(BinaryName, UnqualifiedName, &'a str), String> {
    match rest.split_whitespace().collect::<Vec<_>>()[..] {
        [qualified, descriptor] => {
            let (class, name) = qualified
                .rsplit_once('.')
                .ok_or_else(|| format!("expected `owner.name`, got `{}`", qualified))?;
            Ok((
                BinaryName::from_str(class)?,
                UnqualifiedName::from_str(name)?,
                descriptor,
            ))
        }
        _ => Err(format!("expected `owner.name descriptor`, got `{}`", rest)),
    }
}

fn single<'a>(mnemonic: &str, rest: &'a str) -> Result<&'a str, String> {
    match rest.split_whitespace().collect::<Vec<_>>()[..] {
        [operand] => Ok(operand),
        _ => Err(format!("`{}` takes exactly one operand", mnemonic)),
    }
}

fn instruction(mnemonic: &str, rest: &str) -> Result<Instruction, String> {
    use Instruction::*;

    if let Some((_, insn)) = ZERO_OPERAND_INSTRUCTIONS
        .iter()
        .find(|(name, _)| *name == mnemonic)
    {
        if !rest.is_empty() {
            return Err(format!("`{}` takes no operands", mnemonic));
        }
        return Ok(insn.clone());
    }

    // `iload_1` and friends
    if let Some((base, slot)) = mnemonic.split_once('_') {
        let is_local_access = matches!(
            base,
            "iload" | "lload" | "fload" | "dload" | "aload" | "istore" | "lstore" | "fstore"
                | "dstore" | "astore"
        );
        if is_local_access && slot.parse::<u16>().is_ok() && rest.is_empty() {
            return instruction(base, slot);
        }
    }

    // Conditional branches
    for comparison in ORD_COMPARISONS {
        let suffix = ord_suffix(&comparison);
        if mnemonic.strip_prefix("if_icmp") == Some(suffix) {
            return Ok(IfICmp(comparison, label(single(mnemonic, rest)?)?));
        }
        if mnemonic.strip_prefix("if") == Some(suffix) {
            return Ok(If(comparison, label(single(mnemonic, rest)?)?));
        }
    }

    let insn = match mnemonic {
        "bipush" => BiPush(number(single(mnemonic, rest)?)?),
        "sipush" => SiPush(number(single(mnemonic, rest)?)?),
        "ldc" | "ldc_w" | "ldc2_w" => Ldc(literal(rest)?),

        "iload" => ILoad(number(single(mnemonic, rest)?)?),
        "lload" => LLoad(number(single(mnemonic, rest)?)?),
        "fload" => FLoad(number(single(mnemonic, rest)?)?),
        "dload" => DLoad(number(single(mnemonic, rest)?)?),
        "aload" => ALoad(number(single(mnemonic, rest)?)?),
        "istore" => IStore(number(single(mnemonic, rest)?)?),
        "lstore" => LStore(number(single(mnemonic, rest)?)?),
        "fstore" => FStore(number(single(mnemonic, rest)?)?),
        "dstore" => DStore(number(single(mnemonic, rest)?)?),
        "astore" => AStore(number(single(mnemonic, rest)?)?),
        "iinc" => match rest.split_whitespace().collect::<Vec<_>>()[..] {
            [slot, delta] => IInc(number(slot)?, number(delta)?),
            _ => return Err("`iinc` takes a slot and a delta".to_owned()),
        },

        "if_acmpeq" => IfACmp(EqComparison::EQ, label(single(mnemonic, rest)?)?),
        "if_acmpne" => IfACmp(EqComparison::NE, label(single(mnemonic, rest)?)?),
        "ifnull" => IfNull(EqComparison::EQ, label(single(mnemonic, rest)?)?),
        "ifnonnull" => IfNull(EqComparison::NE, label(single(mnemonic, rest)?)?),
        "goto" | "goto_w" => Goto(label(single(mnemonic, rest)?)?),
        "tableswitch" => table_switch(rest)?,
        "lookupswitch" => lookup_switch(rest)?,

        "getstatic" | "putstatic" | "getfield" | "putfield" => {
            let (class, name, descriptor) = member(rest)?;
            let field = FieldRef {
                class,
                name,
                descriptor: field_descriptor(descriptor)?,
            };
            match mnemonic {
                "getstatic" => GetStatic(field),
                "putstatic" => PutStatic(field),
                "getfield" => GetField(field),
                _ => PutField(field),
            }
        }
        "invokevirtual" | "invokespecial" | "invokestatic" | "invokeinterface" => {
            let invoke_type = match mnemonic {
                "invokevirtual" => InvokeType::Virtual,
                "invokespecial" => InvokeType::Special,
                "invokestatic" => InvokeType::Static,
                _ => InvokeType::Interface,
            };
            let (class, name, descriptor) = member(rest)?;
            Invoke(
                invoke_type,
                MethodRef {
                    class,
                    name,
                    descriptor: method_descriptor(descriptor)?,
                },
            )
        }
        "invokedynamic" => {
            let mut parts = rest.splitn(3, char::is_whitespace);
            match (parts.next(), parts.next(), parts.next()) {
                (Some(name), Some(descriptor), Some(bootstrap)) => InvokeDynamic(IndyCall {
                    name: UnqualifiedName::from_str(name)?,
                    descriptor: method_descriptor(descriptor)?,
                    bootstrap: bootstrap.trim().to_owned(),
                }),
                _ => return Err("`invokedynamic` takes a name, descriptor, and bootstrap".to_owned()),
            }
        }

        "new" => New(BinaryName::from_str(single(mnemonic, rest)?)?),
        "newarray" => {
            let keyword = single(mnemonic, rest)?;
            let base_type = BASE_TYPES
                .iter()
                .find(|base_type| base_type_keyword(base_type) == keyword)
                .ok_or_else(|| format!("unknown primitive type `{}`", keyword))?;
            NewArray(*base_type)
        }
        "anewarray" => ANewArray(class_operand(single(mnemonic, rest)?)?),
        "checkcast" => CheckCast(class_operand(single(mnemonic, rest)?)?),
        "instanceof" => InstanceOf(class_operand(single(mnemonic, rest)?)?),
        "multianewarray" => match rest.split_whitespace().collect::<Vec<_>>()[..] {
            [class, dimensions] => MultiANewArray(class_operand(class)?, number(dimensions)?),
            _ => return Err("`multianewarray` takes a class and dimensions".to_owned()),
        },

        "jsr" | "jsr_w" | "ret" => {
            return Err(format!("`{}` is not supported", mnemonic));
        }
        _ => return Err(format!("unknown instruction `{}`", mnemonic)),
    };
    Ok(insn)
}

/// Parse `<low> <label>... default <label>`
fn table_switch(rest: &str) -> Result<Instruction, String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match &tokens[..] {
        [low, targets @ .., "default", default] => Ok(Instruction::TableSwitch {
            default: label(default)?,
            low: number(low)?,
            targets: targets
                .iter()
                .map(|target| label(target))
                .collect::<Result<_, _>>()?,
        }),
        _ => Err(format!("malformed `tableswitch {}`", rest)),
    }
}

/// Parse `<key>:<label>... default <label>`
fn lookup_switch(rest: &str) -> Result<Instruction, String> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    match &tokens[..] {
        [targets @ .., "default", default] => {
            let mut pairs: Vec<(i32, Label)> = vec![];
            for target in targets {
                let (key, target_label) = target
                    .split_once(':')
                    .ok_or_else(|| format!("expected `key:label`, got `{}`", target))?;
                pairs.push((number(key)?, label(target_label)?));
            }
            pairs.sort_by_key(|(key, _)| *key);
            Ok(Instruction::LookupSwitch {
                default: label(default)?,
                targets: pairs,
            })
        }
        _ => Err(format!("malformed `lookupswitch {}`", rest)),
    }
}

/// Parse the operand of `ldc`
fn literal(rest: &str) -> Result<Constant, String> {
    if let Some(quoted) = rest.strip_prefix('"') {
        return string_literal(quoted).map(Constant::String);
    }
    if let Some(class) = rest.strip_prefix("class ") {
        return class_operand(class.trim()).map(Constant::Class);
    }
    if let Some(long) = rest.strip_suffix('L') {
        return number(long).map(Constant::Long);
    }
    if let Some(float) = rest.strip_suffix('F') {
        return number(float).map(Constant::Float);
    }
    if let Some(double) = rest.strip_suffix('D') {
        return number(double).map(Constant::Double);
    }
    number(rest).map(Constant::Integer)
}

/// Unescape a string literal (the opening quote is already gone)
fn string_literal(quoted: &str) -> Result<String, String> {
    let mut string = String::new();
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                return if chars.as_str().trim().is_empty() {
                    Ok(string)
                } else {
                    Err("trailing input after string literal".to_owned())
                };
            }
            '\\' => match chars.next() {
                Some('"') => string.push('"'),
                Some('\\') => string.push('\\'),
                Some('n') => string.push('\n'),
                Some('r') => string.push('\r'),
                Some('t') => string.push('\t'),
                Some('u') => {
                    let rest = chars.as_str();
                    let close = rest
                        .strip_prefix('{')
                        .and_then(|rest| rest.find('}'))
                        .ok_or_else(|| "malformed `\\u{...}` escape".to_owned())?;
                    let code = u32::from_str_radix(&rest[1..close + 1], 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| "invalid `\\u{...}` escape".to_owned())?;
                    string.push(code);
                    chars = rest[close + 2..].chars();
                }
                other => return Err(format!("invalid escape `\\{}`", other.unwrap_or(' '))),
            },
            c => string.push(c),
        }
    }
    Err("unterminated string literal".to_owned())
}
