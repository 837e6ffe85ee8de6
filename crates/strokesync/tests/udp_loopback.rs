use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use glam::Vec3;

use strokesync::{
    Color3, ProtocolMode, SessionConfig, SessionState, Stroke, SyncSession, WireProfile,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn peer(profile: WireProfile, local: u16, remote: u16) -> SyncSession {
    let config = SessionConfig {
        profile,
        local_bind: format!("127.0.0.1:{}", local),
        ..SessionConfig::default()
    };
    let mut session = SyncSession::new(config);
    session
        .start(&format!("127.0.0.1:{}", remote), ProtocolMode::Udp)
        .unwrap();
    session
}

fn wait_open(sessions: &mut [&mut SyncSession], timeout_ms: u64) {
    let start = Instant::now();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        for s in sessions.iter_mut() {
            s.poll();
        }
        if sessions.iter().all(|s| s.state() == SessionState::Open) {
            return;
        }
        thread::sleep(Duration::from_millis(1));
    }
    panic!("sessions did not open");
}

fn wait_for_strokes(session: &mut SyncSession, count: usize, timeout_ms: u64) -> usize {
    let start = Instant::now();
    let mut delivered = 0;
    while delivered < count && start.elapsed() < Duration::from_millis(timeout_ms) {
        delivered += session.poll();
        thread::sleep(Duration::from_millis(1));
    }
    delivered
}

fn roundtrip(profile: WireProfile) {
    let port = next_port();
    let mut a = peer(profile, port, port + 1);
    let mut b = peer(profile, port + 1, port);
    wait_open(&mut [&mut a, &mut b], 1000);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    b.on_stroke_received(move |stroke| sink.lock().unwrap().push(stroke));

    let points = vec![
        Vec3::new(0.0, 0.0, 0.0),
        Vec3::new(10.0, 0.0, 0.0),
        Vec3::new(10.0, 10.0, 0.0),
    ];
    let stroke = Stroke::new(42, Color3::new(1.0, 0.0, 0.0), points.clone());
    assert!(a.send_stroke(&stroke));

    assert_eq!(wait_for_strokes(&mut b, 1, 1000), 1);

    let received = received.lock().unwrap();
    assert_eq!(received[0].index(), 42);
    assert!((received[0].color().to_vec3() - Vec3::X).length() < 1e-3);
    for (got, want) in received[0].points().iter().zip(&points) {
        assert!((*got - *want).length() < 1e-3);
    }

    assert_eq!(a.stats().strokes_sent, 1);
    assert_eq!(b.stats().strokes_delivered, 1);
}

#[test]
fn test_raw_binary_over_udp() {
    roundtrip(WireProfile::RawBinaryMulti);
}

#[test]
fn test_json_base64_over_udp() {
    roundtrip(WireProfile::JsonBase64);
}

#[test]
fn test_retransmission_is_suppressed() {
    let port = next_port();
    let config = SessionConfig {
        send_interval_ms: 5,
        local_bind: format!("127.0.0.1:{}", port),
        ..SessionConfig::default()
    };
    let mut a = SyncSession::new(config);
    a.start(&format!("127.0.0.1:{}", port + 1), ProtocolMode::Udp)
        .unwrap();
    let mut b = peer(WireProfile::RawBinaryMulti, port + 1, port);
    wait_open(&mut [&mut a, &mut b], 1000);

    let stroke = Stroke::new(
        7,
        Color3::WHITE,
        vec![Vec3::ZERO, Vec3::ONE, Vec3::splat(2.0)],
    );
    assert!(a.send_stroke(&stroke));
    thread::sleep(Duration::from_millis(10));
    assert!(a.send_stroke(&stroke));

    assert_eq!(wait_for_strokes(&mut b, 1, 500), 1);

    let start = Instant::now();
    while b.stats().payloads_received < 2 && start.elapsed() < Duration::from_millis(500) {
        b.poll();
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(b.stats().strokes_delivered, 1);
    assert_eq!(b.stats().duplicates_dropped, 1);
}
