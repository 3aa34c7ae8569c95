pub mod image_io;
pub mod notify;
pub mod recorder;
pub mod replay;
pub mod valve_line;

pub use notify::FileNotifier;
pub use recorder::RunDirectoryRecorder;
pub use replay::ReplayFrameSource;
pub use valve_line::LineValveActuator;
