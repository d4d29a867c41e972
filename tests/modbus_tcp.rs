mod common;

use common::{DeviceState, FakeInverter, closed_port};
use growatt_rs::{
    Field, GrowattError, Inverter, InverterStatus, ModbusException, ModbusTcpTransport, Register,
    RegisterBank, Transport,
};
use std::time::Duration;

fn transport_to(port: u16) -> ModbusTcpTransport {
    ModbusTcpTransport::new("127.0.0.1", port, 1, Duration::from_secs(1))
}

fn inverter_at(device: &FakeInverter) -> Inverter<ModbusTcpTransport> {
    Inverter::new("test", transport_to(device.addr.port()))
}

fn approx(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("field should be available");
    assert!(
        (actual - expected).abs() < 1e-6,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test]
async fn connect_is_idempotent() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut transport = transport_to(device.addr.port());

    transport.connect().await.unwrap();
    transport.connect().await.unwrap();
    assert!(transport.is_connected());
    assert_eq!(
        transport.read_registers(0, 1, RegisterBank::Input).await.unwrap(),
        vec![1]
    );
    assert_eq!(device.state().connections, 1);

    transport.close().await;
    transport.close().await;
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn collects_decoded_snapshot() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut inverter = inverter_at(&device);

    let snapshot = inverter.collect_all().await;
    assert_eq!(snapshot.unavailable_count(), 0);
    approx(snapshot.get(Register::Pv1Voltage), 300.5);
    approx(snapshot.get(Register::AcFrequency), 50.02);
    approx(snapshot.get(Register::TodayEnergy), 7456.5);
    approx(snapshot.get(Register::TotalEnergy), 1234.5);
    approx(snapshot.get(Field::PvPower), 2993.0);
    assert_eq!(snapshot.status_label().as_deref(), Some("Normal"));
    assert_eq!(device.state().connections, 1);
}

#[tokio::test]
async fn exception_response_is_protocol_error() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut transport = transport_to(device.addr.port());

    let err = transport
        .read_registers(200, 1, RegisterBank::Input)
        .await
        .unwrap_err();
    assert!(err.is_protocol_error());
    assert!(matches!(
        err,
        GrowattError::Protocol {
            address: 200,
            exception: ModbusException::IllegalDataAddress,
        }
    ));
    // The session survives an exception response.
    assert!(transport.is_connected());
    assert!(transport.read_registers(0, 1, RegisterBank::Input).await.is_ok());
}

#[tokio::test]
async fn power_limit_writes_command_memory_then_limit() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut inverter = inverter_at(&device);

    let outcome = inverter.set_power_limit(40).await.unwrap();
    assert!(outcome.needs_refresh());
    assert_eq!(device.state().writes, vec![(2, 1), (3, 40)]);
    assert_eq!(inverter.read_field(Register::PowerLimit).await.unwrap(), 40.0);
}

#[tokio::test]
async fn refused_command_memory_is_reported_after_limit_write() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    device.state().rejected_writes.insert(2);
    let mut inverter = inverter_at(&device);

    let outcome = inverter.set_power_limit(70).await.unwrap();
    assert_eq!(
        outcome.refused,
        Some((Register::CmdMemory, ModbusException::IllegalDataValue))
    );
    assert!(outcome.needs_refresh());
    assert_eq!(device.state().writes, vec![(2, 1), (3, 70)]);
    assert_eq!(device.state().holding.get(&3), Some(&70));
}

#[tokio::test]
async fn enable_and_disable() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut inverter = inverter_at(&device);

    let off = inverter.set_inverter_enable(false).await.unwrap();
    assert!(off.needs_refresh());
    assert_eq!(device.state().holding.get(&0), Some(&0));

    let on = inverter.set_inverter_enable(true).await.unwrap();
    assert!(on.needs_refresh());
    assert_eq!(device.state().holding.get(&0), Some(&1));
}

#[tokio::test]
async fn reconnects_after_peer_hangs_up() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    let mut transport = transport_to(device.addr.port());

    transport.read_registers(0, 1, RegisterBank::Input).await.unwrap();
    device.hang_up();

    let err = transport
        .read_registers(0, 1, RegisterBank::Input)
        .await
        .unwrap_err();
    assert!(err.is_connection_error(), "unexpected error: {err}");
    assert!(!transport.is_connected());

    assert_eq!(
        transport.read_registers(0, 1, RegisterBank::Input).await.unwrap(),
        vec![1]
    );
    assert_eq!(device.state().connections, 2);
}

#[tokio::test]
async fn silent_device_times_out() {
    let device = FakeInverter::start(DeviceState::healthy()).await;
    device.state().silent = true;
    let mut transport = transport_to(device.addr.port());

    let err = transport
        .read_registers(0, 1, RegisterBank::Input)
        .await
        .unwrap_err();
    assert!(matches!(err, GrowattError::Timeout(_)));
    assert!(err.is_connection_error());
    assert!(!transport.is_connected());
}

#[tokio::test]
async fn nothing_listening_gives_unavailable_snapshot() {
    let port = closed_port().await;
    let mut inverter = Inverter::new("offline", transport_to(port));

    let snapshot = inverter.collect_all().await;
    assert_eq!(snapshot.available_count(), 0);
    assert_eq!(snapshot.values.len(), Register::ALL.len() + 1);
    assert_eq!(snapshot.inverter_running(), None);

    let err = inverter.connect().await.unwrap_err();
    assert!(err.is_connection_error());
}

#[tokio::test]
async fn test_connection_reports_status() {
    let device = FakeInverter::start(DeviceState::healthy().input(0, &[3])).await;
    let mut inverter = inverter_at(&device);

    assert_eq!(inverter.test_connection().await.unwrap(), InverterStatus::Fault);
    assert!(!inverter.is_connected());
}
