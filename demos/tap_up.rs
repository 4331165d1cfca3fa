#[macro_use]
extern crate clap;
extern crate emacnet;
extern crate env_logger;
extern crate get_if_addrs;
#[macro_use]
extern crate lazy_static;

mod env;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use emacnet::linux::tap::Tap;
use emacnet::net::ethernet::EthernetStack;
use emacnet::net::marshal::Config;
use emacnet::net::netstack::NetStack;
use emacnet::net::repr::EthernetFrame;
use emacnet::net::stack::Host;

/// Opens a Linux TAP interface, brings a stack up on top of it and prints the
/// frames addressed to it.
fn main() {
    env_logger::init();

    let matches = clap_app!(app =>
        (@arg TAP: "TAP interface to open, defaults to tap0")
        (@arg QUEUE: -q --queue +takes_value "Receive queue length of the stack")
    ).get_matches();

    let ifr_name = matches.value_of("TAP").unwrap_or("tap0");
    let queue_len = matches
        .value_of("QUEUE")
        .map(|queue_len| queue_len.parse::<usize>().expect("Bad queue length!"))
        .unwrap_or(64);

    let tap = Tap::new(ifr_name, *env::DEFAULT_ETH_ADDR, env::pool()).expect("Opening TAP failed!");
    let netstack = NetStack::bringup(Arc::new(tap), EthernetStack::new(queue_len), &Config::default())
        .expect("Bringing the stack up failed!");

    match env::ifr_addr(ifr_name) {
        Some(host_addr) => println!(
            "{} is UP as {} (host {})!",
            ifr_name,
            netstack.mac_address().unwrap(),
            host_addr
        ),
        None => println!("{} is UP as {}!", ifr_name, netstack.mac_address().unwrap()),
    }

    loop {
        let frames = netstack
            .call(|host: &mut Host<EthernetStack>| {
                let mut frames = vec![];
                while let Some(received) = host.stack.recv() {
                    frames.push(received.buffer.into_vec());
                }
                frames
            })
            .expect("Stack context closed!");

        for frame in frames {
            if let Ok(frame) = EthernetFrame::try_new(&frame[..]) {
                println!(
                    "{} -> {} type {:#06x}, {} bytes",
                    frame.src_addr(),
                    frame.dst_addr(),
                    frame.payload_type(),
                    frame.payload().len()
                );
            }
        }

        thread::sleep(Duration::from_millis(100));
    }
}
