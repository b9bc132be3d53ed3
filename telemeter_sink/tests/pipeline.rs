use std::net::UdpSocket;
use std::sync::Arc;
use std::time::Duration;

use influxdb_line_protocol::{parse_lines, FieldValue};
use telemeter_core::{metered, timed, CollectorRegistry, MeasurementSpec, Tags};
use telemeter_sink::{SinkConfig, TelegrafSink};

fn listener() -> (UdpSocket, u16) {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket
        .set_read_timeout(Some(Duration::from_secs(2)))
        .unwrap();
    let port = socket.local_addr().unwrap().port();
    (socket, port)
}

fn receive(socket: &UdpSocket) -> String {
    let mut buf = [0u8; 65_536];
    let (len, _) = socket.recv_from(&mut buf).unwrap();
    String::from_utf8_lossy(&buf[..len]).into_owned()
}

#[test]
fn test_metered_calls_reach_listener() {
    let (socket, port) = listener();
    let sink = TelegrafSink::configure(
        SinkConfig::builder()
            .uri(format!("udp://127.0.0.1:{}", port))
            .buffer_size(2)
            .prefix("app")
            .build(),
    )
    .unwrap();

    let registry = Arc::new(CollectorRegistry::new());
    registry.set(sink);

    let lookup = metered(
        &registry,
        MeasurementSpec::new("lookups", "count").tags_with(|(user,): &(String,), _: &()| {
            Tags::from([("user".to_string(), user.clone())])
        }),
    )
    .sync("lookup", |_: &(), (user,): (String,)| {
        if user == "root" {
            Err("forbidden user")
        } else {
            Ok(user.len())
        }
    });

    assert_eq!(lookup.call(("alice".to_string(),)).wait(), Ok(5));
    assert_eq!(lookup.call(("root".to_string(),)).wait(), Err("forbidden user"));

    let datagram = receive(&socket);
    let lines: Vec<_> = parse_lines(&datagram).collect::<Result<_, _>>().unwrap();
    assert_eq!(lines.len(), 2);

    for line in &lines {
        assert_eq!(line.series.measurement.to_string(), "app.lookups");
        assert_eq!(line.field_set[0].0.to_string(), "count");
        assert!(matches!(line.field_set[0].1, FieldValue::I64(1)));
        assert!(line.timestamp.is_some());
    }

    let users: Vec<String> = lines
        .iter()
        .map(|line| line.series.tag_set.as_ref().unwrap()[0].1.to_string())
        .collect();
    assert_eq!(users, vec!["alice", "root"]);
}

#[tokio::test]
async fn test_timed_future_flushed_by_timer() {
    let (socket, port) = listener();
    let sink = TelegrafSink::configure(
        SinkConfig::builder()
            .uri(format!("127.0.0.1:{}", port))
            .buffer_size(100)
            .flush_interval(Duration::from_millis(50))
            .build(),
    )
    .unwrap();

    let registry = Arc::new(CollectorRegistry::new());
    registry.set(sink);

    let slow = timed(&registry, MeasurementSpec::new("slow", "duration_ns")).future(
        "slow",
        |_: &(), (ms,): (u64,)| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok::<_, ()>(ms)
        },
    );

    assert_eq!(slow.call((20,)).await, Ok(20));

    let datagram = tokio::task::spawn_blocking(move || receive(&socket))
        .await
        .unwrap();
    let line = parse_lines(&datagram).next().unwrap().unwrap();
    assert_eq!(line.series.measurement.to_string(), "slow");
    match line.field_set[0].1 {
        FieldValue::I64(nanos) => assert!(nanos >= 20_000_000),
        ref other => panic!("unexpected field value {:?}", other),
    }
}
