/// Elements with a width
///
/// On the JVM, `long` and `double` values take up two local variable slots while everything else
/// takes one. The operand stack counts the same way for the purpose of the `pop2`/`dup2` family of
/// instructions.
pub trait Width {
    fn width(&self) -> usize;
}
