use super::BodyRoutine;
use crate::jvm::code::{ExceptionHandler, Routine};
use crate::jvm::{BinaryName, FieldType, MethodAccessFlags, MethodDescriptor, UnqualifiedName};

/// Build `init$body` out of the code after the chaining call
///
/// The new first parameter is the (now initialized) `this`, so it lands in local 0 just like the
/// receiver did, and the original parameters keep their slots. The code is copied unchanged.
pub fn build_body_routine(
    owner: &BinaryName,
    routine: &Routine,
    call: usize,
    handlers: Vec<ExceptionHandler>,
) -> BodyRoutine {
    let mut parameters = vec![FieldType::object(owner.clone())];
    parameters.extend(routine.descriptor.parameters.iter().cloned());

    BodyRoutine {
        routine: Routine {
            owner: owner.clone(),
            name: UnqualifiedName::INIT_BODY,
            descriptor: MethodDescriptor {
                parameters,
                return_type: None,
            },
            access_flags: MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
            exceptions: routine.exceptions.clone(),
            instructions: routine.instructions[call + 1..].to_vec(),
            handlers,
        },
        slot_shift: 0,
    }
}
