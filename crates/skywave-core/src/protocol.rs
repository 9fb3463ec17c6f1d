use serde::Deserialize;

/// Control commands accepted from the configuration layer.
///
/// Unknown preset/mode values inside a structurally valid command are
/// rejected by the pipeline with a warning, keeping the last valid
/// configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ClientCommand {
    /// Selects an AGC preset; mode 4 disables AGC.
    Agc { mode: u8 },
    NoiseGatePreset { preset: String },
    NoiseGate { enabled: bool },
    NoiseBlanker { enabled: bool },
    NoiseReduction { enabled: bool },
    BufferDelay { limit: f64, threshold: f64 },
    Channels { channels: u8 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_from_tagged_json() {
        let cmd: ClientCommand = serde_json::from_str(r#"{"cmd":"agc","mode":2}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::Agc { mode: 2 }));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"cmd":"noise_gate_preset","preset":"cw"}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::NoiseGatePreset { preset } if preset == "cw"));

        let cmd: ClientCommand =
            serde_json::from_str(r#"{"cmd":"buffer_delay","limit":0.5,"threshold":0.1}"#).unwrap();
        assert!(matches!(cmd, ClientCommand::BufferDelay { .. }));
    }

    #[test]
    fn unknown_command_tag_is_an_error() {
        assert!(serde_json::from_str::<ClientCommand>(r#"{"cmd":"squelch","enabled":true}"#).is_err());
    }
}
