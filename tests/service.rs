//! Client and service over a real Unix socket.

use fingervote::core::{EnrollOptions, IdentificationOutcome, VoterDetails, VotingStation};
use fingervote::protocol::{ErrorKind, Response};
use fingervote::sensor::{SensorDevice, SimulatedSensor};
use fingervote::service::handle_connection;
use fingervote::ServiceClient;
use std::os::unix::net::UnixListener;
use std::thread;

/// Serves `connections` requests in order on a fresh dev-mode station.
fn spawn_service(listener: UnixListener, connections: usize) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut station = VotingStation::new(
            SensorDevice::Simulated(SimulatedSensor::default().with_idle_limit(5)),
            100,
            EnrollOptions::immediate(),
        );
        for stream in listener.incoming().take(connections) {
            let mut stream = stream.unwrap();
            handle_connection(&mut stream, &mut station, true).unwrap();
        }
    })
}

fn alice() -> VoterDetails {
    VoterDetails {
        voter_id: "V1".to_string(),
        name: "Alice".to_string(),
        age: "30".to_string(),
        gender: "F".to_string(),
        address: "X".to_string(),
    }
}

#[test]
fn enroll_identify_confirm_reset_over_socket() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("fingervote.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let service = spawn_service(listener, 7);

    let client = ServiceClient::new(&socket).quiet();

    assert!(matches!(client.touch(5, 2).unwrap(), Response::Touched { pending: 2 }));

    match client.enroll(alice()).unwrap() {
        Response::Enrolled(record) => assert_eq!(record.slot_id, 1),
        other => panic!("unexpected response: {:?}", other),
    }

    client.touch(5, 1).unwrap();
    match client.identify().unwrap() {
        Response::Identified(IdentificationOutcome::Recognized { record, .. }) => {
            assert_eq!(record.voter_id, "V1");
        }
        other => panic!("unexpected response: {:?}", other),
    }

    match client.confirm("V1").unwrap() {
        Response::Confirmed(confirmation) => assert_eq!(confirmation.name, "Alice"),
        other => panic!("unexpected response: {:?}", other),
    }

    assert_eq!(client.reset().unwrap(), Response::ResetComplete);

    match client.confirm("V1").unwrap() {
        Response::Error(err) => assert_eq!(err.kind, ErrorKind::NotFound),
        other => panic!("unexpected response: {:?}", other),
    }

    service.join().unwrap();
}

#[test]
fn validation_error_is_a_client_error() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("fingervote.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let service = spawn_service(listener, 1);

    let client = ServiceClient::new(&socket).quiet();
    let mut details = alice();
    details.address.clear();

    match client.enroll(details).unwrap() {
        Response::Error(err) => {
            assert_eq!(err.kind, ErrorKind::Validation);
            assert!(err.kind.is_client_error());
            assert!(err.message.contains("address"));
        }
        other => panic!("unexpected response: {:?}", other),
    }

    service.join().unwrap();
}

#[test]
fn enrollment_without_touches_times_out_and_frees_the_service() {
    let dir = tempfile::tempdir().unwrap();
    let socket = dir.path().join("fingervote.sock");
    let listener = UnixListener::bind(&socket).unwrap();
    let service = spawn_service(listener, 3);

    let client = ServiceClient::new(&socket).quiet();

    match client.enroll(alice()).unwrap() {
        Response::Error(err) => {
            assert_eq!(err.kind, ErrorKind::Sensor);
            assert_eq!(err.sensor_code, Some(0xFF));
        }
        other => panic!("unexpected response: {:?}", other),
    }

    // Later connections are still served
    assert!(matches!(client.touch(5, 2).unwrap(), Response::Touched { pending: 2 }));
    match client.enroll(alice()).unwrap() {
        Response::Enrolled(record) => assert_eq!(record.slot_id, 1),
        other => panic!("unexpected response: {:?}", other),
    }

    service.join().unwrap();
}

#[test]
fn missing_service_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let client = ServiceClient::new(dir.path().join("absent.sock")).quiet();

    let err = client.stats().unwrap_err();
    assert!(err.to_string().contains("Failed to connect"));
}
