mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use podlink_core::command::{DeviceCommand, DeviceEvent, DeviceResponse};
use podlink_core::config::{Config, SessionConfig};
use podlink_core::controller::Controller;
use podlink_core::error::TransportError;
use podlink_core::transport::{DeviceProvider, Transport};
use podlink_core::PodError;
use podlink_net::{NetProvider, NetTransport};
use podlink_types::{ItemId, NotificationKind, Origin, ParamId, ParamTarget, ParamValue, SessionPhase};

fn provider(addr: &str) -> Arc<NetProvider> {
    let config = Config::from_toml_str(&format!(
        "[session]\ndiscovery_timeout_ms = 500\ncommand_timeout_ms = 2000\n[discovery]\naddresses = [\"{}\"]\n",
        addr
    ))
    .unwrap();
    Arc::new(NetProvider::from_config(&config, "tests"))
}

#[test]
fn transport_round_trip() {
    let (_bridge, _device, addr) = common::bridged();
    let transport = NetTransport::connect(&addr, "tests", Duration::from_secs(2)).unwrap();
    assert_eq!(transport.device().id, common::DEVICE);

    let response = transport.send(&DeviceCommand::QueryCurrentSetId).unwrap();
    assert!(matches!(response, DeviceResponse::SetId(_)));

    transport.close();
    assert_eq!(
        transport.send(&DeviceCommand::QueryCurrentSetId),
        Err(TransportError::Closed)
    );
}

#[test]
fn provider_finds_bridged_devices() {
    let (_bridge, _device, addr) = common::bridged();
    let provider = provider(&addr);
    let found: Vec<String> = provider.scan().iter().map(|d| d.id).collect();
    assert_eq!(found, vec![common::DEVICE.to_string()]);

    assert!(matches!(
        provider.connect("nope"),
        Err(PodError::DeviceNotFound(_))
    ));
}

#[test]
fn unreachable_address_yields_nothing() {
    // bind and drop to get a port nobody listens on
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .to_string();
    let provider = provider(&addr);
    assert_eq!(provider.scan().iter().count(), 0);
}

#[test]
fn controller_over_tcp() {
    let (_bridge, device, addr) = common::bridged();
    let controller = Controller::new(provider(&addr), &Config::default());
    let rx = controller.subscribe();

    let listed: Vec<String> = controller.list_devices().iter().map(|d| d.id).collect();
    assert_eq!(listed, vec![common::DEVICE.to_string()]);

    controller.start(common::DEVICE).unwrap();
    assert_eq!(controller.phase(), SessionPhase::Ready);
    assert!(rx.try_iter().any(|n| n.kind == NotificationKind::InitDone));

    controller.set_amp_parameter_value(0, 0, "0.75").unwrap();
    controller.flush().unwrap();
    assert_eq!(device.live(), controller.get_pod().unwrap().live_data());
    rx.try_iter().for_each(drop);

    // front panel change arrives as an event
    let target = ParamTarget::item(ItemId::new(0), ParamId::new(1));
    device.emit(DeviceEvent::Parameter {
        target,
        value: ParamValue::Number(0.25),
    });
    let seen = rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert_eq!(seen.origin, Origin::Device);
    assert_eq!(
        seen.kind,
        NotificationKind::ParameterChanged {
            target,
            value: ParamValue::Number(0.25)
        }
    );

    controller.stop();
    assert!(!controller.is_started());
}

#[test]
fn bridge_shutdown_unbinds_controller() {
    let (mut bridge, _device, addr) = common::bridged();
    let controller = Controller::new(provider(&addr), &Config::default());
    let rx = controller.subscribe();
    controller.start(common::DEVICE).unwrap();

    bridge.shutdown();
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut lost = false;
    while let Ok(n) = rx.recv_deadline(deadline) {
        if matches!(n.kind, NotificationKind::ConnectionLost { .. }) {
            lost = true;
            break;
        }
    }
    assert!(lost);
    assert!(common::wait_until(Duration::from_secs(2), || !controller.is_started()));
    assert_eq!(controller.get_pod().err(), Some(PodError::NotStarted));
}

#[test]
fn session_config_reaches_provider() {
    let config = SessionConfig {
        discovery_timeout: Duration::from_millis(100),
        ..SessionConfig::default()
    };
    let provider = NetProvider::new(Vec::new(), "tests", config);
    assert_eq!(provider.scan().iter().count(), 0);
}
