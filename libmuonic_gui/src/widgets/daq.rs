use super::Widget;

/// The log is cut back to this many bytes (at a line boundary) when it grows past it
const MAX_LOG_BYTES: usize = 256 * 1024;

/// Raw card output and a command line for sending commands by hand
#[derive(Debug, Clone)]
pub struct DaqWidget {
    active: bool,
    daq_msg_log: String,
    /// Text of the command line
    pub command_input: String,
    /// Commands typed so far, oldest first
    pub command_history: Vec<String>,
}

impl Default for DaqWidget {
    fn default() -> Self {
        Self {
            active: true,
            daq_msg_log: String::new(),
            command_input: String::new(),
            command_history: Vec::new(),
        }
    }
}

impl DaqWidget {
    pub fn append_plain_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.daq_msg_log.push_str(text);
        if !self.daq_msg_log.ends_with('\n') {
            self.daq_msg_log.push('\n');
        }
        if self.daq_msg_log.len() > MAX_LOG_BYTES {
            let mut cut = self.daq_msg_log.len() - MAX_LOG_BYTES;
            while !self.daq_msg_log.is_char_boundary(cut) {
                cut += 1;
            }
            let cut = self.daq_msg_log[cut..]
                .find('\n')
                .map(|idx| cut + idx + 1)
                .unwrap_or(cut);
            self.daq_msg_log.drain(..cut);
        }
    }

    pub fn log(&self) -> &str {
        &self.daq_msg_log
    }

    /// Take the command line contents, remembering them in the history
    pub fn take_command_input(&mut self) -> String {
        let text = std::mem::take(&mut self.command_input);
        if !text.trim().is_empty() {
            self.command_history.push(text.trim().to_string());
        }
        text
    }

    pub fn clear(&mut self) {
        self.daq_msg_log.clear();
    }
}

impl Widget for DaqWidget {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_trim() {
        let mut daq = DaqWidget::default();
        daq.append_plain_text("");
        assert_eq!(daq.log(), "");
        daq.append_plain_text("DC C0=0F");
        daq.append_plain_text("TL L0=300\n");
        assert_eq!(daq.log(), "DC C0=0F\nTL L0=300\n");

        let line = "x".repeat(1023);
        for _ in 0..300 {
            daq.append_plain_text(&line);
        }
        assert!(daq.log().len() <= MAX_LOG_BYTES);
        assert!(daq.log().starts_with('x'));
    }

    #[test]
    fn test_command_history() {
        let mut daq = DaqWidget::default();
        daq.command_input = String::from(" ds ");
        assert_eq!(daq.take_command_input(), " ds ");
        assert!(daq.command_input.is_empty());
        daq.command_input = String::from("   ");
        daq.take_command_input();
        assert_eq!(daq.command_history, ["ds"]);
    }
}
