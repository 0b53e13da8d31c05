//! Command surface tests: listing, attributes and their interplay with a
//! running acquisition session.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use daq_core::DeviceInfo;
use daq_driver_mock::{MockContext, MockDevice, MockDeviceConfig, ReadGate, ReadStep};
use parking_lot::Mutex;
use rust_daqd::{AttributeAccess, Connection, DaqError, SessionRegistry, Sink};

fn context() -> (Arc<MockContext>, Arc<MockDevice>, Arc<ReadGate>) {
    let gate = Arc::new(ReadGate::new());
    let adc = Arc::new(
        MockDevice::new("iio:device0")
            .with_name("ad7476")
            .with_attribute("sampling_frequency", "1000000")
            .with_attribute("scale", "0.805664062")
            .with_gate(Arc::clone(&gate)),
    );
    let ctx = MockContext::new()
        .with_device(adc.clone())
        .with_device(Arc::new(MockDevice::new("iio:device1")));
    (Arc::new(ctx), adc, gate)
}

fn connection(ctx: &Arc<MockContext>, registry: &SessionRegistry, verbose: bool) -> (Connection, Arc<Mutex<Vec<u8>>>) {
    let buffer = Arc::new(Mutex::new(Vec::new()));
    let sink: Sink = buffer.clone();
    let conn = Connection::new(ctx.clone(), registry.clone(), sink).with_verbose(verbose);
    (conn, buffer)
}

fn output(buffer: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(buffer.lock().clone()).unwrap()
}

#[test]
fn test_list_devices() {
    let (ctx, _, _) = context();
    let (conn, _) = connection(&ctx, &SessionRegistry::default(), false);

    assert_eq!(
        conn.list_devices(),
        vec![
            DeviceInfo {
                id: "iio:device0".to_string(),
                name: Some("ad7476".to_string()),
            },
            DeviceInfo {
                id: "iio:device1".to_string(),
                name: None,
            },
        ]
    );
}

#[test]
fn test_attribute_read_by_id_and_name() {
    let (ctx, _, _) = context();
    let (conn, buffer) = connection(&ctx, &SessionRegistry::default(), false);

    assert_eq!(conn.read_dev_attr("iio:device0", "sampling_frequency"), Ok(7));
    assert_eq!(conn.read_dev_attr("ad7476", "scale"), Ok(11));
    assert_eq!(output(&buffer), "7\n1000000\n11\n0.805664062\n");
}

#[test]
fn test_attribute_errors() {
    let (ctx, _, _) = context();
    let registry = SessionRegistry::default();

    let (quiet, quiet_buf) = connection(&ctx, &registry, false);
    assert_eq!(
        quiet.read_dev_attr("iio:device7", "scale"),
        Err(DaqError::DeviceNotFound)
    );
    assert!(quiet.read_dev_attr("iio:device0", "missing").is_err());
    assert_eq!(output(&quiet_buf), "-19\n-2\n");

    let (loud, loud_buf) = connection(&ctx, &registry, true);
    assert!(loud.write_dev_attr("iio:device0", "missing", "1").is_err());
    assert_eq!(output(&loud_buf), "ERROR: No such file or directory\n");
}

#[test]
fn test_attribute_write_then_read() {
    let (ctx, adc, _) = context();
    let (conn, buffer) = connection(&ctx, &SessionRegistry::default(), false);

    assert_eq!(
        conn.write_dev_attr("iio:device0", "sampling_frequency", "500000"),
        Ok(6)
    );
    assert_eq!(adc.attribute("sampling_frequency").as_deref(), Some("500000"));
    assert_eq!(conn.read_dev_attr("iio:device0", "sampling_frequency"), Ok(6));
    assert_eq!(output(&buffer), "6\n6\n500000\n");
}

#[test]
fn test_attribute_buffer_truncates() {
    let (ctx, _, _) = context();
    let (conn, buffer) = connection(&ctx, &SessionRegistry::default(), false);
    let conn = conn.with_attribute_access(AttributeAccess::new(4));

    assert_eq!(conn.read_dev_attr("iio:device0", "sampling_frequency"), Ok(4));
    assert_eq!(output(&buffer), "4\n1000\n");
}

#[test]
fn test_attributes_do_not_wait_for_streaming() {
    let (ctx, adc, gate) = context();
    let registry = SessionRegistry::default();

    let (streamer, stream_buf) = connection(&ctx, &registry, false);
    let reader = thread::spawn(move || streamer.read_dev("iio:device0", 8, 2));
    assert!(adc.wait_for_reads(1, Duration::from_secs(5)));

    // The hardware read is blocked; attribute access goes straight through.
    let (conn, buffer) = connection(&ctx, &registry, false);
    assert_eq!(conn.read_dev_attr("ad7476", "scale"), Ok(11));
    assert_eq!(output(&buffer), "11\n0.805664062\n");
    assert!(registry.is_active("iio:device0"));

    gate.push(ReadStep::Full);
    assert_eq!(reader.join().unwrap(), Ok(16));
    assert_eq!(stream_buf.lock().len(), 16);
}

#[test]
fn test_context_from_configs() {
    let configs: Vec<MockDeviceConfig> = toml::from_str::<toml::Table>(
        r#"
        [[devices]]
        id = "iio:device3"
        name = "ad9361"
        attributes = { rf_bandwidth = "18000000" }
        "#,
    )
    .unwrap()["devices"]
        .clone()
        .try_into()
        .unwrap();
    let ctx = Arc::new(MockContext::from_configs(&configs));
    let (conn, buffer) = connection(&ctx, &SessionRegistry::default(), false);

    assert_eq!(conn.read_dev_attr("ad9361", "rf_bandwidth"), Ok(8));
    assert_eq!(output(&buffer), "8\n18000000\n");
}
