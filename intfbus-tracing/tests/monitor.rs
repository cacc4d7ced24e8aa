use std::{
    io,
    sync::{Arc, Mutex},
};

use intfbus::prelude::*;
use intfbus_tracing::TracingMonitor;

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Captured {
    fn lines(&self) -> Vec<String> {
        let buffer = self.0.lock().unwrap();
        String::from_utf8_lossy(&buffer)
            .lines()
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn capture(f: impl FnOnce()) -> Vec<String> {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, f);
    captured.lines()
}

struct Token;

impl Interface for Token {
    fn provide<'a>(&'a self, _request: &mut Request<'a>) {}
}

#[test]
fn test_logs_every_operation() {
    let lines = capture(|| {
        let token = Ref::new_monitored(
            Token,
            TracingMonitor {
                drops_only: false,
                verbose: true,
            },
        );
        let copy = token.clone();
        drop(copy);
        drop(token);
    });

    let counts: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("reference count changed"))
        .collect();
    assert_eq!(counts.len(), 4, "{lines:#?}");
    assert!(counts[0].contains("DEBUG"));
    assert!(counts[0].contains("op=ref"));
    assert!(counts[0].contains("count_after=1"));
    assert!(counts[1].contains("count_after=2"));
    assert!(counts[3].contains("op=unref"));
    assert!(counts[3].contains("count_after=0"));
}

#[test]
fn test_drops_only() {
    let lines = capture(|| {
        let token = Ref::new_monitored(
            Token,
            TracingMonitor {
                drops_only: true,
                verbose: false,
            },
        );
        let copies: Vec<_> = (0..5).map(|_| token.clone()).collect();
        drop(copies);
        drop(token);
    });

    let counts: Vec<&String> = lines
        .iter()
        .filter(|line| line.contains("reference count changed"))
        .collect();
    assert_eq!(counts.len(), 1, "{lines:#?}");
    assert!(counts[0].contains("TRACE"));
    assert!(counts[0].contains("count_before=1"));
}

#[test]
fn test_bus_structure_is_logged() {
    let lines = capture(|| {
        let bus = Bus::new(0);
        assert!(bus.connect(Ref::new_ex(Token)));
        bus.finish();
    });

    assert!(lines.iter().any(|line| line.contains("connected interface")));
    assert!(lines.iter().any(|line| line.contains("tearing down bus")));
    assert!(lines.iter().any(|line| line.contains("bus torn down")));
}
