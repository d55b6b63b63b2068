/// Something the runner can drive one host command at a time.
pub trait Firmware {
    fn init(&mut self);
    /// Serve one host interaction. May block on serial input.
    fn step(&mut self);
    fn should_exit(&self) -> bool;
    fn exit(&mut self);

    fn title(&self) -> String;
}
