//! Basic introduction to intfbus.
//!
//! This example demonstrates the fundamental concepts:
//! 1. Declaring an interface with `declare_interface!`
//! 2. Creating reference-counted objects with `Ref::new` and `Ref::new_ex`
//! 3. Looking up interfaces with `query`
//! 4. Finding collaborators through a bus

use intfbus::{declare_interface, prelude::*};

/// An interface is a trait extending `Interface`, plus an identifier.
trait Greeter: Interface {
    fn greet(&self, name: &str) -> String;
}
declare_interface!(dyn Greeter = "7A1F5C1E-4E8B-4F0B-9F8D-0C3C2B9E6A11");

/// Another interface, implemented by a different component.
trait Audience: Interface {
    fn name(&self) -> &str;
}
declare_interface!(dyn Audience = "0E2D8C55-3A4B-4C2D-8E6F-1A2B3C4D5E6F");

struct EnglishGreeter;

impl Greeter for EnglishGreeter {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}!")
    }
}

/// `provide` lists the interfaces an object answers to, in order.
impl Interface for EnglishGreeter {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request.provide::<dyn Greeter>(self);
    }
}

struct World;

impl Audience for World {
    fn name(&self) -> &str {
        "world"
    }
}

impl Interface for World {
    fn provide<'a>(&'a self, request: &mut Request<'a>) {
        request.provide::<dyn Audience>(self);
    }

    fn on_finish(&self) {
        println!("The world is shutting down");
    }
}

fn main() {
    tracing::subscriber::set_global_default(
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .finish(),
    )
    .expect("failed to set subscriber");

    println!("=== Objects and interfaces ===\n");

    let greeter = Ref::new(EnglishGreeter);
    println!("greeter count: {}", greeter.ref_count());

    // Looking up an interface hands out a new owning reference.
    let as_greeter = greeter.query::<dyn Greeter>().expect("greeter");
    println!("{}", as_greeter.greet("you"));
    println!("greeter count: {}", greeter.ref_count());
    drop(as_greeter);

    // A plain object only knows about itself.
    println!(
        "greeter knows an audience: {}",
        greeter.query::<dyn Audience>().is_some()
    );
    println!();

    println!("=== Components on a bus ===\n");

    let bus = Bus::new(0);
    let greeter = Ref::new_ex(EnglishGreeter);
    bus.connect(greeter.clone());
    bus.connect(Ref::new_ex(World));

    // The greeter does not implement `Audience`, but its bus finds it.
    let audience = greeter.query::<dyn Audience>().expect("audience");
    println!("{}", greeter.greet(audience.name()));
    drop(audience);
    println!();

    println!("=== Teardown ===\n");
    bus.finish();
    println!("greeter finished: {}", greeter.finished());
    println!("greeter count: {}", greeter.ref_count());
}
