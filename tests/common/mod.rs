//! Reference interpreter for the instruction subset used in tests
//!
//! It only knows about one class (the owner of the initializer under test). Calls to anything
//! other than boxing methods are recorded in a trace and return a zero value, which makes the
//! trace the observable behaviour to compare between the original initializer and its split
//! reconstruction.

#![allow(dead_code)]

use ctorsplit::jvm::code::{Constant, EqComparison, Instruction, InvokeType, OrdComparison, Routine};
use ctorsplit::jvm::{BaseType, FieldType, Name, RenderDescriptor};
use ctorsplit::listing::{self, ListingError};
use ctorsplit::split::SplitResult;
use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

/// Concrete value
///
/// Like on the JVM, `long` and `double` take two stack entries or local slots: the value itself
/// followed by a `Top`.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    Ref(usize),
    Top,
}

impl Value {
    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    /// Zero value of a type
    fn zero(field_type: &FieldType) -> Value {
        match field_type {
            FieldType::Base(BaseType::Long) => Value::Long(0),
            FieldType::Base(BaseType::Float) => Value::Float(0.0),
            FieldType::Base(BaseType::Double) => Value::Double(0.0),
            FieldType::Base(_) => Value::Int(0),
            FieldType::Ref(_) => Value::Null,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Object {
    Instance {
        class: String,
        fields: BTreeMap<String, Value>,
        initialized: bool,
    },
    Array(Vec<Value>),
    Boxed(Value),
    Str(String),
}

/// Ways a test can go wrong
#[derive(Debug)]
pub enum TestError {
    Listing(ListingError),
    Split(ctorsplit::Error),
    Unsupported(String),
    Stuck(String),
}

impl From<ListingError> for TestError {
    fn from(err: ListingError) -> TestError {
        TestError::Listing(err)
    }
}

impl From<ctorsplit::Error> for TestError {
    fn from(err: ctorsplit::Error) -> TestError {
        TestError::Split(err)
    }
}

enum Outcome {
    Returned(Option<Value>),
    Finished,
}

pub struct Machine {
    heap: Vec<Object>,

    /// Static fields (as `Class.name`)
    statics: HashMap<String, Value>,

    /// Instance being initialized
    this: Option<usize>,

    /// Observable events, in order
    pub trace: Vec<String>,
}

impl Machine {
    pub fn new(statics: &[(&str, Value)]) -> Machine {
        Machine {
            heap: vec![],
            statics: statics
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
            this: None,
            trace: vec![],
        }
    }

    fn alloc(&mut self, object: Object) -> Value {
        self.heap.push(object);
        Value::Ref(self.heap.len() - 1)
    }

    fn new_this(&mut self, class: &str) -> Value {
        let this = self.alloc(Object::Instance {
            class: class.to_owned(),
            fields: BTreeMap::new(),
            initialized: false,
        });
        if let Value::Ref(index) = this {
            self.this = Some(index);
        }
        this
    }

    /// Run an initializer unchanged
    pub fn run_original(&mut self, routine: &Routine, params: &[Value]) -> Result<(), TestError> {
        let this = self.new_this(routine.owner.as_str());
        let mut locals = Self::locals(routine, std::iter::once(this).chain(params.iter().cloned()));
        let mut stack = vec![];
        self.execute(routine, &mut locals, &mut stack, 0..routine.instructions.len())?;
        self.record_state();
        Ok(())
    }

    /// Run the prefix of an initializer, then `init$args`, the chaining call, and `init$body`
    ///
    /// Parameters that the argument code wrote are reloaded from the snapshot array before the
    /// body runs.
    pub fn run_split(
        &mut self,
        routine: &Routine,
        split: &SplitResult,
        params: &[Value],
    ) -> Result<(), TestError> {
        let this = self.new_this(routine.owner.as_str());

        let mut locals = Self::locals(
            routine,
            std::iter::once(this.clone()).chain(params.iter().cloned()),
        );
        let mut stack = vec![];
        self.execute(routine, &mut locals, &mut stack, 0..split.self_load)?;
        if !stack.is_empty() {
            return Err(TestError::Stuck("prefix left values on the stack".to_owned()));
        }

        // Arguments
        let snapshot = self.alloc(Object::Array(vec![Value::Null; routine.max_locals()]));
        let args = &split.args.routine;
        let mut args_locals =
            Self::locals(args, std::iter::once(snapshot.clone()).chain(params.iter().cloned()));
        let packed = match self.execute(args, &mut args_locals, &mut vec![], 0..args.instructions.len())? {
            Outcome::Returned(Some(Value::Ref(packed))) => packed,
            _ => return Err(TestError::Stuck("`init$args` did not return an array".to_owned())),
        };
        let packed = match &self.heap[packed] {
            Object::Array(elements) => elements.clone(),
            _ => return Err(TestError::Stuck("`init$args` did not return an array".to_owned())),
        };

        // Chaining call
        let parameters = &split.delegation.descriptor.parameters;
        if packed.len() != parameters.len() {
            return Err(TestError::Stuck("wrong number of packed arguments".to_owned()));
        }
        let arguments: Vec<Value> = packed
            .iter()
            .zip(parameters)
            .map(|(value, field_type)| self.unbox(value, field_type))
            .collect();
        self.chain(
            &this,
            &format!(
                "{}.{}{}",
                split.delegation.class.as_str(),
                split.delegation.name.as_str(),
                split.delegation.descriptor.render()
            ),
            &arguments,
        )?;

        // Body
        let mirrored = match &self.heap[self.index(&snapshot)?] {
            Object::Array(elements) => elements.clone(),
            _ => return Err(TestError::Stuck("snapshot is not an array".to_owned())),
        };
        let mut body_params = vec![this];
        for ((slot, field_type), value) in routine.parameter_slots().into_iter().zip(params) {
            if split.args.mirrored_slots.contains(&slot) {
                body_params.push(self.unbox(&mirrored[slot as usize], field_type));
            } else {
                body_params.push(value.clone());
            }
        }
        let body = &split.body.routine;
        let mut body_locals = Self::locals(body, body_params.into_iter());
        self.execute(body, &mut body_locals, &mut vec![], 0..body.instructions.len())?;

        self.record_state();
        Ok(())
    }

    /// Lay out arguments in local slots
    fn locals(routine: &Routine, arguments: impl Iterator<Item = Value>) -> Vec<Value> {
        let mut locals = vec![];
        for argument in arguments {
            let wide = argument.is_wide();
            locals.push(argument);
            if wide {
                locals.push(Value::Top);
            }
        }
        let size = routine.max_locals().max(locals.len());
        locals.resize(size, Value::Top);
        locals
    }

    fn index(&self, value: &Value) -> Result<usize, TestError> {
        match value {
            Value::Ref(index) => Ok(*index),
            Value::Null => Err(TestError::Stuck("null dereference".to_owned())),
            other => Err(TestError::Stuck(format!("expected a reference, got {:?}", other))),
        }
    }

    fn unbox(&self, value: &Value, field_type: &FieldType) -> Value {
        match (value, field_type) {
            (Value::Ref(index), FieldType::Base(_)) => match &self.heap[*index] {
                Object::Boxed(inner) => inner.clone(),
                _ => value.clone(),
            },
            _ => value.clone(),
        }
    }

    fn chain(&mut self, receiver: &Value, target: &str, arguments: &[Value]) -> Result<(), TestError> {
        let index = self.index(receiver)?;
        match &mut self.heap[index] {
            Object::Instance { initialized, .. } if !*initialized => *initialized = true,
            _ => return Err(TestError::Stuck(format!("{} on an initialized object", target))),
        }
        let event = if Some(index) == self.this {
            format!("chain {}({})", target, self.render_all(arguments))
        } else {
            format!("new {}({})", target, self.render_all(arguments))
        };
        self.trace.push(event);
        Ok(())
    }

    fn record_state(&mut self) {
        if let Some(this) = self.this {
            let rendered = self.render(&Value::Ref(this), true);
            self.trace.push(format!("state {}", rendered));
        }
    }

    fn render_all(&self, values: &[Value]) -> String {
        values
            .iter()
            .filter(|value| **value != Value::Top)
            .map(|value| self.render(value, false))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render(&self, value: &Value, expand_this: bool) -> String {
        match value {
            Value::Int(int) => int.to_string(),
            Value::Long(long) => format!("{}L", long),
            Value::Float(float) => format!("{:?}F", float),
            Value::Double(double) => format!("{:?}D", double),
            Value::Null => "null".to_owned(),
            Value::Top => "top".to_owned(),
            Value::Ref(index) if Some(*index) == self.this && !expand_this => "this".to_owned(),
            Value::Ref(index) => match &self.heap[*index] {
                Object::Instance { class, fields, .. } => {
                    let fields: Vec<String> = fields
                        .iter()
                        .map(|(name, value)| format!("{}={}", name, self.render(value, false)))
                        .collect();
                    format!("{}{{{}}}", class, fields.join(", "))
                }
                Object::Array(elements) => format!("[{}]", self.render_all(elements)),
                Object::Boxed(inner) => format!("box({})", self.render(inner, false)),
                Object::Str(string) => format!("{:?}", string),
            },
        }
    }

    fn execute(
        &mut self,
        routine: &Routine,
        locals: &mut Vec<Value>,
        stack: &mut Vec<Value>,
        range: Range<usize>,
    ) -> Result<Outcome, TestError> {
        use Instruction::*;

        let labels = routine.label_positions();
        let jump = |label: &ctorsplit::jvm::code::Label| {
            labels
                .get(label)
                .copied()
                .ok_or_else(|| TestError::Stuck(format!("unknown label {:?}", label)))
        };

        let mut pc = range.start;
        let mut fuel = 100_000;
        while pc < range.end {
            fuel -= 1;
            if fuel == 0 {
                return Err(TestError::Stuck("out of fuel".to_owned()));
            }

            let insn = &routine.instructions[pc];
            pc += 1;
            match insn {
                Label(_) | Nop | CheckCast(_) => (),

                AConstNull => stack.push(Value::Null),
                IConstM1 => stack.push(Value::Int(-1)),
                IConst0 => stack.push(Value::Int(0)),
                IConst1 => stack.push(Value::Int(1)),
                IConst2 => stack.push(Value::Int(2)),
                IConst3 => stack.push(Value::Int(3)),
                IConst4 => stack.push(Value::Int(4)),
                IConst5 => stack.push(Value::Int(5)),
                LConst0 => push(stack, Value::Long(0)),
                LConst1 => push(stack, Value::Long(1)),
                BiPush(byte) => stack.push(Value::Int(*byte as i32)),
                SiPush(short) => stack.push(Value::Int(*short as i32)),
                Ldc(constant) => {
                    let value = match constant {
                        Constant::Integer(int) => Value::Int(*int),
                        Constant::Long(long) => Value::Long(*long),
                        Constant::Float(float) => Value::Float(*float),
                        Constant::Double(double) => Value::Double(*double),
                        Constant::String(string) => self.alloc(Object::Str(string.clone())),
                        Constant::Class(_) => return Err(unsupported(insn)),
                    };
                    push(stack, value);
                }

                ILoad(slot) | FLoad(slot) | ALoad(slot) => {
                    stack.push(locals[*slot as usize].clone());
                }
                LLoad(slot) | DLoad(slot) => push(stack, locals[*slot as usize].clone()),
                IStore(slot) | FStore(slot) | AStore(slot) => {
                    locals[*slot as usize] = pop(stack)?;
                }
                LStore(slot) | DStore(slot) => {
                    locals[*slot as usize] = pop_wide(stack)?;
                    locals[*slot as usize + 1] = Value::Top;
                }
                IInc(slot, delta) => match &mut locals[*slot as usize] {
                    Value::Int(int) => *int = int.wrapping_add(*delta as i32),
                    _ => return Err(TestError::Stuck("iinc on a non-int".to_owned())),
                },

                Pop => {
                    pop(stack)?;
                }
                Pop2 => {
                    pop(stack)?;
                    pop(stack)?;
                }
                Dup => shuffle(stack, 1, 0)?,
                DupX1 => shuffle(stack, 1, 1)?,
                DupX2 => shuffle(stack, 1, 2)?,
                Dup2 => shuffle(stack, 2, 0)?,
                Dup2X1 => shuffle(stack, 2, 1)?,
                Dup2X2 => shuffle(stack, 2, 2)?,
                Swap => {
                    let top = pop(stack)?;
                    let below = pop(stack)?;
                    stack.push(top);
                    stack.push(below);
                }

                IAdd | ISub | IMul => {
                    let right = pop_int(stack)?;
                    let left = pop_int(stack)?;
                    stack.push(Value::Int(match insn {
                        IAdd => left.wrapping_add(right),
                        ISub => left.wrapping_sub(right),
                        _ => left.wrapping_mul(right),
                    }));
                }
                LAdd | LSub | LMul => {
                    let right = pop_long(stack)?;
                    let left = pop_long(stack)?;
                    push(
                        stack,
                        Value::Long(match insn {
                            LAdd => left.wrapping_add(right),
                            LSub => left.wrapping_sub(right),
                            _ => left.wrapping_mul(right),
                        }),
                    );
                }
                INeg => {
                    let value = pop_int(stack)?;
                    stack.push(Value::Int(value.wrapping_neg()));
                }
                I2L => {
                    let value = pop_int(stack)?;
                    push(stack, Value::Long(value as i64));
                }

                If(comparison, label) => {
                    if compare(comparison, pop_int(stack)?, 0) {
                        pc = jump(label)?;
                    }
                }
                IfICmp(comparison, label) => {
                    let right = pop_int(stack)?;
                    let left = pop_int(stack)?;
                    if compare(comparison, left, right) {
                        pc = jump(label)?;
                    }
                }
                IfNull(comparison, label) => {
                    let is_null = pop(stack)? == Value::Null;
                    if is_null == (*comparison == EqComparison::EQ) {
                        pc = jump(label)?;
                    }
                }
                Goto(label) => pc = jump(label)?,

                IReturn | FReturn | AReturn => return Ok(Outcome::Returned(Some(pop(stack)?))),
                LReturn | DReturn => return Ok(Outcome::Returned(Some(pop_wide(stack)?))),
                Return => return Ok(Outcome::Returned(None)),

                GetStatic(field) => {
                    let key = format!("{}.{}", field.class.as_str(), field.name.as_str());
                    let value = self
                        .statics
                        .get(&key)
                        .cloned()
                        .unwrap_or_else(|| Value::zero(&field.descriptor));
                    push(stack, value);
                }
                PutStatic(field) => {
                    let value = pop_typed(stack, &field.descriptor)?;
                    let key = format!("{}.{}", field.class.as_str(), field.name.as_str());
                    let event = format!("putstatic {} = {}", key, self.render(&value, false));
                    self.trace.push(event);
                    self.statics.insert(key, value);
                }
                GetField(field) => {
                    let receiver = pop(stack)?;
                    let index = self.index(&receiver)?;
                    let value = match &self.heap[index] {
                        Object::Instance { fields, .. } => fields
                            .get(field.name.as_str())
                            .cloned()
                            .unwrap_or_else(|| Value::zero(&field.descriptor)),
                        _ => return Err(TestError::Stuck("getfield on a non-instance".to_owned())),
                    };
                    push(stack, value);
                }
                PutField(field) => {
                    let value = pop_typed(stack, &field.descriptor)?;
                    let receiver = pop(stack)?;
                    let index = self.index(&receiver)?;
                    match &mut self.heap[index] {
                        Object::Instance { fields, .. } => {
                            fields.insert(field.name.as_str().to_owned(), value);
                        }
                        _ => return Err(TestError::Stuck("putfield on a non-instance".to_owned())),
                    }
                }

                Invoke(invoke_type, method) => {
                    let mut arguments = vec![];
                    for parameter in method.descriptor.parameters.iter().rev() {
                        arguments.push(pop_typed(stack, parameter)?);
                    }
                    arguments.reverse();
                    let target = format!(
                        "{}.{}{}",
                        method.class.as_str(),
                        method.name.as_str(),
                        method.descriptor.render()
                    );

                    if *invoke_type == InvokeType::Special && method.name.is_init() {
                        let receiver = pop(stack)?;
                        self.chain(&receiver, &target, &arguments)?;
                    } else if *invoke_type == InvokeType::Static
                        && method.name.as_str() == "valueOf"
                        && method.class.as_str().starts_with("java/lang/")
                    {
                        let boxed = self.alloc(Object::Boxed(arguments[0].clone()));
                        stack.push(boxed);
                    } else {
                        if *invoke_type != InvokeType::Static {
                            arguments.insert(0, pop(stack)?);
                        }
                        let event = format!("call {}({})", target, self.render_all(&arguments));
                        self.trace.push(event);
                        if let Some(return_type) = &method.descriptor.return_type {
                            push(stack, Value::zero(return_type));
                        }
                    }
                }

                New(class) => {
                    let object = self.alloc(Object::Instance {
                        class: class.as_str().to_owned(),
                        fields: BTreeMap::new(),
                        initialized: false,
                    });
                    stack.push(object);
                }
                ANewArray(_) => {
                    let length = pop_int(stack)?;
                    let array = self.alloc(Object::Array(vec![Value::Null; length as usize]));
                    stack.push(array);
                }
                AALoad => {
                    let index = pop_int(stack)? as usize;
                    let array = self.index(&pop(stack)?)?;
                    let element = match &self.heap[array] {
                        Object::Array(elements) => elements[index].clone(),
                        _ => return Err(TestError::Stuck("aaload on a non-array".to_owned())),
                    };
                    stack.push(element);
                }
                AAStore => {
                    let value = pop(stack)?;
                    let index = pop_int(stack)? as usize;
                    let array = self.index(&pop(stack)?)?;
                    match &mut self.heap[array] {
                        Object::Array(elements) => elements[index] = value,
                        _ => return Err(TestError::Stuck("aastore on a non-array".to_owned())),
                    }
                }
                ArrayLength => {
                    let array = self.index(&pop(stack)?)?;
                    match &self.heap[array] {
                        Object::Array(elements) => stack.push(Value::Int(elements.len() as i32)),
                        _ => return Err(TestError::Stuck("arraylength on a non-array".to_owned())),
                    }
                }

                _ => return Err(unsupported(insn)),
            }
        }
        Ok(Outcome::Finished)
    }
}

fn unsupported(insn: &Instruction) -> TestError {
    TestError::Unsupported(insn.to_string())
}

fn compare(comparison: &OrdComparison, left: i32, right: i32) -> bool {
    match comparison {
        OrdComparison::EQ => left == right,
        OrdComparison::NE => left != right,
        OrdComparison::LT => left < right,
        OrdComparison::GE => left >= right,
        OrdComparison::GT => left > right,
        OrdComparison::LE => left <= right,
    }
}

/// Push a value, along with a `Top` if it is wide
fn push(stack: &mut Vec<Value>, value: Value) {
    let wide = value.is_wide();
    stack.push(value);
    if wide {
        stack.push(Value::Top);
    }
}

fn pop(stack: &mut Vec<Value>) -> Result<Value, TestError> {
    stack
        .pop()
        .ok_or_else(|| TestError::Stuck("stack underflow".to_owned()))
}

fn pop_wide(stack: &mut Vec<Value>) -> Result<Value, TestError> {
    match pop(stack)? {
        Value::Top => pop(stack),
        other => Err(TestError::Stuck(format!("expected a wide value, got {:?}", other))),
    }
}

fn pop_typed(stack: &mut Vec<Value>, field_type: &FieldType) -> Result<Value, TestError> {
    match field_type {
        FieldType::Base(BaseType::Long) | FieldType::Base(BaseType::Double) => pop_wide(stack),
        _ => pop(stack),
    }
}

fn pop_int(stack: &mut Vec<Value>) -> Result<i32, TestError> {
    match pop(stack)? {
        Value::Int(int) => Ok(int),
        other => Err(TestError::Stuck(format!("expected an int, got {:?}", other))),
    }
}

fn pop_long(stack: &mut Vec<Value>) -> Result<i64, TestError> {
    match pop_wide(stack)? {
        Value::Long(long) => Ok(long),
        other => Err(TestError::Stuck(format!("expected a long, got {:?}", other))),
    }
}

/// Duplicate the top `copied` entries and insert them `skipped` entries further down
///
/// This covers the whole `dup` family, since wide values take up two entries.
fn shuffle(stack: &mut Vec<Value>, copied: usize, skipped: usize) -> Result<(), TestError> {
    if stack.len() < copied + skipped {
        return Err(TestError::Stuck("stack underflow".to_owned()));
    }
    let top: Vec<Value> = stack[stack.len() - copied..].to_vec();
    let insert_at = stack.len() - copied - skipped;
    for (offset, value) in top.into_iter().enumerate() {
        stack.insert(insert_at + offset, value);
    }
    Ok(())
}

/// Parse a listing with exactly one routine
pub fn single_routine(source: &str) -> Result<Routine, TestError> {
    let mut listing = listing::parse(source)?;
    match listing.routines.len() {
        1 => Ok(listing.routines.remove(0)),
        n => Err(TestError::Unsupported(format!("expected one routine, got {}", n))),
    }
}

/// Run an initializer both unsplit and split, returning both traces
pub fn both_traces(
    routine: &Routine,
    split: &SplitResult,
    statics: &[(&str, Value)],
    params: &[Value],
) -> Result<(Vec<String>, Vec<String>), TestError> {
    let mut original = Machine::new(statics);
    original.run_original(routine, params)?;

    let mut reconstructed = Machine::new(statics);
    reconstructed.run_split(routine, split, params)?;

    Ok((original.trace, reconstructed.trace))
}
