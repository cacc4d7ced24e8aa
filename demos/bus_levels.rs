//! Bus levels, siblings and teardown order.
//!
//! Lower levels are more privileged. A bus sees the buses of higher levels
//! connected to it, and the buses of its own level it is linked to, but never
//! the buses above it.
//!
//! Run with `INTFBUS_TRACING=drops` to only see objects being destroyed.

use std::sync::Arc;

use intfbus::{declare_interface, hooks::ref_monitor::RefTally, prelude::*};

trait Named: Interface {
    fn label(&self) -> &'static str;
}
declare_interface!(dyn Named = "5C8E0F3A-9B1D-4E27-A6C4-7D2F1E0B3A98");

trait Kernel: Interface {}
declare_interface!(dyn Kernel = "C3A1E9B0-2D4F-4A6B-8C7E-9F0A1B2C3D4E");

struct Service(&'static str);

impl Named for Service {
    fn label(&self) -> &'static str {
        self.0
    }
}

impl Interface for Service {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request.provide::<dyn Named>(self);
    }

    fn on_finish(&self) {
        println!("  finishing {}", self.0);
    }
}

struct KernelImpl;

impl Kernel for KernelImpl {}

impl Interface for KernelImpl {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request.provide::<dyn Kernel>(self);
    }
}

fn main() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .finish(),
    )
    .expect("failed to set subscriber");
    intfbus_tracing::install();

    let tally = Arc::new(RefTally::default());

    let system = Bus::new(0);
    let drivers = Bus::new(1);
    let apps = Bus::new(2);
    let peer = Bus::new(0);

    system.connect(drivers.clone());
    drivers.connect(apps.clone());
    system.connect(peer.clone());

    let kernel = Ref::new_ex(KernelImpl);
    kernel.set_monitor(tally.clone());
    system.connect(kernel.clone());
    drivers.connect_with_priority(Ref::new_ex(Service("disk")), 1);
    drivers.connect_with_priority(Ref::new_ex(Service("network")), 0);
    let app = Ref::new_ex(Service("editor"));
    apps.connect(app.clone());
    peer.connect(Ref::new_ex(Service("peer service")));

    let first = kernel.query::<dyn Named>();
    println!(
        "first service the kernel sees: {}",
        first.as_ref().map_or("none", |named| named.label())
    );
    drop(first);
    println!("app sees the kernel: {}", app.query::<dyn Kernel>().is_some());
    println!(
        "level 2 bus from the system bus is apps: {}",
        system
            .find_first_bus_by_level(2)
            .is_some_and(|found| Ref::ptr_eq(&found, &apps))
    );
    println!("system siblings: {}", system.total_siblings());

    println!("\nTearing down the system bus:");
    drop(drivers);
    drop(apps);
    system.finish();

    println!("\npeer still active: {}", !peer.finished());
    println!("peer siblings: {}", peer.total_siblings());
    println!("kernel finished: {}", kernel.finished());
    drop(kernel);
    println!("kernel references balanced: {}", tally.is_balanced());
}
