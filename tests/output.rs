#[macro_use]
extern crate assert_matches;
extern crate emacnet;
extern crate env_logger;
extern crate rand;

mod context;

use std::sync::Arc;

use emacnet::net::adapter;
use emacnet::net::buffer::{
    Pool,
    SendError,
};
use emacnet::net::netif::Interface;
use emacnet::net::stack::Host;
use emacnet::Error;

use context::{
    MockMac,
    MockStack,
};

#[test]
fn send_while_down_hands_buffer_back() {
    let pool = Pool::new(4);
    let mac = Arc::new(MockMac::new());
    let (executor, num) = context::bringup(mac.clone());

    let buffer = pool.alloc_from(&[0xAB; 64]).unwrap();
    let result = executor
        .handle()
        .call(move |host: &mut Host<MockStack>| host.output(num, buffer, context::dst()))
        .unwrap();

    match result {
        Err(SendError::Returned(Error::LinkDown, buffer)) => {
            assert_eq!(buffer.as_ref(), &[0xAB; 64][..]);
            assert_eq!(pool.freed(), 0);
        }
        other => panic!("Expected LinkDown with the buffer, got {:?}.", other),
    }

    assert_eq!(pool.freed(), 1);
    assert_eq!(mac.link_outs(), 0);

    let outputs = executor
        .handle()
        .call(|host: &mut Host<MockStack>| host.stack.outputs)
        .unwrap();
    assert_eq!(outputs, 0);
}

#[test]
fn send_while_up() {
    let pool = Pool::new(4);
    let mac = Arc::new(MockMac::new());
    let (executor, num) = context::bringup(mac.clone());
    mac.link(true).unwrap();

    let buffer = pool.alloc_from(&[1, 2, 3, 4]).unwrap();
    let result = executor
        .handle()
        .call(move |host: &mut Host<MockStack>| host.output(num, buffer, context::dst()))
        .unwrap();

    assert_matches!(result, Ok(()));
    assert_eq!(mac.link_outs(), 1);
    assert_eq!(mac.sent(), vec![vec![1, 2, 3, 4]]);
    assert_eq!(pool.freed(), 1);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn send_transmit_failed() {
    let pool = Pool::new(4);
    let mac = Arc::new(MockMac::new());
    let (executor, num) = context::bringup(mac.clone());
    mac.link(true).unwrap();
    mac.set_send_ok(false);

    let buffer = pool.alloc(60).unwrap();
    let result = executor
        .handle()
        .call(move |host: &mut Host<MockStack>| host.output(num, buffer, context::dst()))
        .unwrap();

    assert_matches!(result, Err(SendError::Consumed(Error::TransmitFailed)));
    assert_eq!(mac.link_outs(), 1);
    assert_eq!(pool.freed(), 1);

    // Transmit errors leave the link alone.
    assert!(context::is_up(&executor.handle(), num));
}

#[test]
fn send_consumes_exactly_once() {
    const SENDS: usize = 200;

    let pool = Pool::new(SENDS);
    let mac = Arc::new(MockMac::new());
    let (executor, num) = context::bringup(mac.clone());
    mac.link(true).unwrap();

    for i in 0 .. SENDS {
        let ok = rand::random::<bool>();
        mac.set_send_ok(ok);

        let buffer = pool.alloc_from(&[i as u8; 16]).unwrap();
        let result = executor
            .handle()
            .call(move |host: &mut Host<MockStack>| host.output(num, buffer, context::dst()))
            .unwrap();

        if ok {
            assert_matches!(result, Ok(()));
        } else {
            assert_matches!(result, Err(SendError::Consumed(Error::TransmitFailed)));
        }
        assert_eq!(pool.freed(), i + 1);
    }

    assert_eq!(mac.link_outs(), SENDS);
    assert_eq!(pool.allocated(), SENDS);
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn low_level_output_without_device() {
    let pool = Pool::new(1);
    let mut interface = Interface::new(0);
    interface.link_output = Some(adapter::low_level_output);

    assert_matches!(
        interface.link_output(pool.alloc(10).unwrap()),
        Err(Error::NoOp)
    );
    assert_eq!(pool.freed(), 1);
}

#[test]
fn output_without_interface() {
    let pool = Pool::new(1);
    let (executor, num) = context::bringup(Arc::new(MockMac::new()));

    let buffer = pool.alloc(10).unwrap();
    let result = executor
        .handle()
        .call(move |host: &mut Host<MockStack>| host.output(num + 1, buffer, context::dst()))
        .unwrap();

    assert_matches!(result, Err(SendError::Returned(Error::NoOp, _)));
}
