use std::io::Write;

use tracing::trace;

use crate::controller::valves::{ValveCommand, ValveMap};
use crate::error::{Result, SortError};
use crate::hardware::ValveActuator;

/// Writes each command set as one line of `sh <pin>` / `sl <pin>` tokens to a
/// byte sink (serial port, pipe, file).
pub struct LineValveActuator<W: Write + Send> {
    writer: W,
    map: ValveMap,
}

impl<W: Write + Send> LineValveActuator<W> {
    pub fn new(writer: W, map: ValveMap) -> Self {
        Self { writer, map }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ValveActuator for LineValveActuator<W> {
    fn execute(&mut self, commands: &[ValveCommand]) -> Result<()> {
        let line = self.map.render(commands);
        trace!(line = %line, "Valve command");
        writeln!(self.writer, "{line}")
            .and_then(|_| self.writer.flush())
            .map_err(|e| SortError::Actuation(e.to_string()))
    }
}
