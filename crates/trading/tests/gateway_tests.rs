//! Order gateway round trip: client ring to exchange ring and back
//!
//! Drives the exchange-side gateway server and the client-side gateway by
//! hand over a real loopback socket, checking framing, per-client sequence
//! enforcement and response routing.

use bus::SpscRing;
use common::{
    ClientRequest, ClientResponse, Limits, RequestKind, ResponseKind, Side,
};
use exchange::networking::OrderGatewayServer;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use trading::networking::OrderGatewayClient;

struct Loop {
    ogs: OrderGatewayServer,
    ogc: OrderGatewayClient,
    srv_requests: Arc<SpscRing<ClientRequest>>,
    srv_responses: Arc<SpscRing<ClientResponse>>,
    cli_requests: Arc<SpscRing<ClientRequest>>,
    cli_responses: Arc<SpscRing<ClientResponse>>,
}

fn setup(client_id: u32) -> Loop {
    let limits = Limits::small();
    let srv_requests: Arc<SpscRing<ClientRequest>> = Arc::new(SpscRing::new(256));
    let srv_responses: Arc<SpscRing<ClientResponse>> = Arc::new(SpscRing::new(256));
    let cli_requests: Arc<SpscRing<ClientRequest>> = Arc::new(SpscRing::new(256));
    let cli_responses: Arc<SpscRing<ClientResponse>> = Arc::new(SpscRing::new(256));

    let ogs = OrderGatewayServer::new(
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        &limits,
        Arc::clone(&srv_requests),
        Arc::clone(&srv_responses),
        Arc::new(AtomicBool::new(true)),
    )
    .expect("gateway listen");
    let addr = match ogs.local_addr().expect("bound address") {
        SocketAddr::V4(a) => a,
        SocketAddr::V6(_) => unreachable!("bound v4"),
    };
    let ogc = OrderGatewayClient::connect(
        client_id,
        addr,
        Arc::clone(&cli_requests),
        Arc::clone(&cli_responses),
        Arc::new(AtomicBool::new(true)),
    )
    .expect("gateway connect");

    Loop {
        ogs,
        ogc,
        srv_requests,
        srv_responses,
        cli_requests,
        cli_responses,
    }
}

fn pump(l: &mut Loop, until: impl Fn(&Loop) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        l.ogc.poll_once();
        l.ogs.poll_once();
        if until(l) {
            return true;
        }
        if Instant::now() > deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

fn request(client_id: u32, order_id: u64) -> ClientRequest {
    ClientRequest {
        kind: RequestKind::New,
        client_id,
        ticker_id: 0,
        order_id,
        side: Side::Buy,
        price: 100,
        qty: 10,
    }
}

#[test]
fn requests_and_responses_round_trip() {
    let mut l = setup(3);

    *l.cli_requests.next_write() = request(3, 1);
    l.cli_requests.commit_write();

    assert!(pump(&mut l, |l| l.srv_requests.size() > 0));
    let received = *l.srv_requests.next_read().unwrap();
    l.srv_requests.commit_read();
    assert_eq!(received, request(3, 1));

    // a response finds its way back through the client binding
    let response = ClientResponse {
        kind: ResponseKind::Accepted,
        client_id: 3,
        ticker_id: 0,
        client_order_id: 1,
        market_order_id: 9,
        side: Side::Buy,
        price: 100,
        qty_exec: 0,
        qty_remain: 10,
    };
    *l.srv_responses.next_write() = response;
    l.srv_responses.commit_write();

    assert!(pump(&mut l, |l| l.cli_responses.size() > 0));
    let received = *l.cli_responses.next_read().unwrap();
    l.cli_responses.commit_read();
    assert_eq!(received, response);
}

#[test]
fn several_requests_keep_their_order() {
    let mut l = setup(5);
    for oid in 1..=4u64 {
        *l.cli_requests.next_write() = request(5, oid);
        l.cli_requests.commit_write();
    }

    assert!(pump(&mut l, |l| l.srv_requests.size() >= 4));
    let mut oids = Vec::new();
    while let Some(r) = l.srv_requests.next_read() {
        oids.push(r.order_id);
        l.srv_requests.commit_read();
    }
    assert_eq!(oids, vec![1, 2, 3, 4]);
}

#[test]
fn out_of_sequence_requests_are_dropped_without_advancing() {
    use common::wire::WireClientRequest;
    use net::TcpClient;
    use zerocopy::AsBytes;

    let limits = Limits::small();
    let srv_requests: Arc<SpscRing<ClientRequest>> = Arc::new(SpscRing::new(256));
    let srv_responses: Arc<SpscRing<ClientResponse>> = Arc::new(SpscRing::new(256));
    let mut ogs = OrderGatewayServer::new(
        SocketAddrV4::new(Ipv4Addr::LOCALHOST, 0),
        &limits,
        Arc::clone(&srv_requests),
        srv_responses,
        Arc::new(AtomicBool::new(true)),
    )
    .expect("gateway listen");
    let addr = match ogs.local_addr().expect("bound address") {
        SocketAddr::V4(a) => a,
        SocketAddr::V6(_) => unreachable!("bound v4"),
    };
    let mut raw = TcpClient::connect(addr).expect("connect");

    // the gateway expects n_seq 1 first; a frame stamped 5 is dropped
    raw.load_tx(WireClientRequest::pack(5, &request(4, 1)).as_bytes());
    let deadline = Instant::now() + Duration::from_millis(300);
    while Instant::now() < deadline {
        raw.poll();
        ogs.poll_once();
        std::thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(srv_requests.size(), 0);

    // the properly numbered frame still goes through afterwards
    raw.load_tx(WireClientRequest::pack(1, &request(4, 2)).as_bytes());
    let deadline = Instant::now() + Duration::from_secs(2);
    while srv_requests.size() == 0 && Instant::now() < deadline {
        raw.poll();
        ogs.poll_once();
        std::thread::sleep(Duration::from_millis(1));
    }
    let received = *srv_requests.next_read().expect("request forwarded");
    assert_eq!(received.order_id, 2);
}
