//! midir device access: API availability, port enumeration, connecting
//!
//! midir picks its backend at build time (ALSA or JACK on Linux, CoreMIDI on
//! macOS, WinMM on Windows), so the requested [`MidiApi`] is only checked
//! against what this build carries.

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use crate::error::MidiDeviceError;
use crate::inbound::InboundCallback;
use loopa_core::MidiApi;

/// Client name of the output device
pub const OUTPUT_NAME: &str = "loopa MIDI output";

/// Client name of the input device
pub const INPUT_NAME: &str = "loopa MIDI input";

/// Backends compiled into this build
pub fn compiled_apis() -> Vec<MidiApi> {
    let mut apis = Vec::new();

    #[cfg(all(target_os = "linux", not(feature = "jack")))]
    apis.push(MidiApi::Alsa);
    #[cfg(feature = "jack")]
    apis.push(MidiApi::Jack);
    #[cfg(target_os = "macos")]
    apis.push(MidiApi::CoreMidi);
    #[cfg(target_os = "windows")]
    apis.push(MidiApi::WindowsMm);

    apis
}

/// `Unspecified` always resolves to the compiled backend
pub fn has_api(api: MidiApi) -> bool {
    api == MidiApi::Unspecified || compiled_apis().contains(&api)
}

fn check_api(api: MidiApi) -> Result<(), MidiDeviceError> {
    if has_api(api) {
        Ok(())
    } else {
        Err(MidiDeviceError::ApiUnavailable(api))
    }
}

fn new_output(client: &'static str) -> Result<MidiOutput, MidiDeviceError> {
    MidiOutput::new(client).map_err(|e| MidiDeviceError::Init {
        client,
        reason: e.to_string(),
    })
}

fn new_input(client: &'static str) -> Result<MidiInput, MidiDeviceError> {
    MidiInput::new(client).map_err(|e| MidiDeviceError::Init {
        client,
        reason: e.to_string(),
    })
}

/// Names of the output ports, in index order
///
/// Ports whose name cannot be read show up as empty strings so indices stay
/// aligned with the device's.
pub fn output_port_names() -> Result<Vec<String>, MidiDeviceError> {
    let midi_out = new_output(OUTPUT_NAME)?;
    Ok(midi_out
        .ports()
        .iter()
        .map(|port| midi_out.port_name(port).unwrap_or_default())
        .collect())
}

/// Names of the input ports, in index order
pub fn input_port_names() -> Result<Vec<String>, MidiDeviceError> {
    let midi_in = new_input(INPUT_NAME)?;
    Ok(midi_in
        .ports()
        .iter()
        .map(|port| midi_in.port_name(port).unwrap_or_default())
        .collect())
}

pub fn output_port_count() -> Result<usize, MidiDeviceError> {
    Ok(new_output(OUTPUT_NAME)?.port_count())
}

pub fn input_port_count() -> Result<usize, MidiDeviceError> {
    Ok(new_input(INPUT_NAME)?.port_count())
}

pub(crate) fn connect_output(
    api: MidiApi,
    index: usize,
) -> Result<MidiOutputConnection, MidiDeviceError> {
    check_api(api)?;
    let midi_out = new_output(OUTPUT_NAME)?;

    let ports = midi_out.ports();
    let port = ports.get(index).ok_or(MidiDeviceError::PortNotFound(index))?;
    let name = midi_out.port_name(port).unwrap_or_default();

    log::info!("[MIDI OUT] Opening port {} '{}' ({})", index, name, api.name());

    midi_out
        .connect(port, &name)
        .map_err(|e| MidiDeviceError::Connect {
            port: index,
            reason: e.to_string(),
        })
}

/// Connect input port `index` and deliver its messages to `callback`
///
/// SysEx and active sensing are filtered out at the driver; timing messages
/// (clock, start, stop) go through.
pub(crate) fn connect_input(
    api: MidiApi,
    index: usize,
    callback: InboundCallback,
) -> Result<MidiInputConnection<InboundCallback>, MidiDeviceError> {
    check_api(api)?;
    let mut midi_in = new_input(INPUT_NAME)?;
    midi_in.ignore(Ignore::SysexAndActiveSense);

    let ports = midi_in.ports();
    let port = ports.get(index).ok_or(MidiDeviceError::PortNotFound(index))?;
    let name = midi_in.port_name(port).unwrap_or_default();

    log::info!("[MIDI IN] Opening port {} '{}' ({})", index, name, api.name());

    midi_in
        .connect(
            port,
            &name,
            |stamp, bytes, callback: &mut InboundCallback| {
                callback.on_driver_message(stamp, bytes);
            },
            callback,
        )
        .map_err(|e| MidiDeviceError::Connect {
            port: index,
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unspecified_api_is_always_available() {
        assert!(has_api(MidiApi::Unspecified));
        assert!(!has_api(MidiApi::Dummy));
    }

    #[test]
    fn test_unavailable_api_is_rejected_before_touching_devices() {
        let result = connect_output(MidiApi::Dummy, 0);
        assert!(matches!(result, Err(MidiDeviceError::ApiUnavailable(MidiApi::Dummy))));
    }

    #[test]
    fn test_port_enumeration_does_not_panic() {
        // Port availability depends on the machine; only check that listing works
        // or fails cleanly.
        if let Ok(names) = output_port_names() {
            log::info!("output ports: {:?}", names);
        }
        if let Ok(names) = input_port_names() {
            log::info!("input ports: {:?}", names);
        }
    }
}
