//! Topology-level tests driving the public API only. Nodes are never started,
//! so no external commands run.

use net_literals::{ipv4, ipv6};
use netemu::{
    IfaceAddr, LinkParams, LinkType, Network, NetworkOptions, Node, NodeObject, NodeOptions,
    NodeType, SessionContext,
};
use std::sync::Arc;
use std::time::Duration;

fn session() -> Arc<SessionContext> {
    let _ = env_logger::builder().is_test(true).try_init();
    SessionContext::new(0xbeef, "/tmp/netemu-topology")
}

fn node(session: &Arc<SessionContext>, name: &str) -> Arc<Node> {
    Node::new(
        session.clone(),
        NodeOptions {
            name: Some(name.to_owned()),
            ..NodeOptions::default()
        },
    )
}

fn switch(session: &Arc<SessionContext>, name: &str) -> Arc<Network> {
    Network::new(
        session.clone(),
        NetworkOptions {
            name: Some(name.to_owned()),
            ..NetworkOptions::default()
        },
    )
}

#[test]
fn two_hosts_on_a_switch() {
    let session = session();
    let n1 = node(&session, "n1");
    let n2 = node(&session, "n2");
    let sw = switch(&session, "sw1");

    let if1 = n1
        .new_netif(
            Some(&sw),
            &[IfaceAddr::V4 {
                addr: ipv4!("10.0.0.1"),
                prefix: 24,
            }],
            Some("02:00:00:00:00:01".parse().unwrap()),
            None,
            None,
        )
        .unwrap();
    let if2 = n2
        .new_netif(
            Some(&sw),
            &[
                IfaceAddr::V4 {
                    addr: ipv4!("10.0.0.2"),
                    prefix: 24,
                },
                IfaceAddr::V6 {
                    addr: ipv6!("fd00::2"),
                    prefix: 64,
                },
            ],
            None,
            None,
            None,
        )
        .unwrap();
    assert_eq!((if1, if2), (0, 0));
    assert_eq!(sw.num_netifs(), 2);

    let links = sw.all_link_data(2);
    assert_eq!(links.len(), 2);
    for link in &links {
        assert_eq!(link.node1_id, sw.id());
        assert_eq!(link.link_type, LinkType::Wired);
        assert!(!link.unidirectional);
    }
    let to_n1 = links.iter().find(|link| link.node2_id == n1.id()).unwrap();
    assert_eq!(to_n1.iface2_id, Some(0));
    assert_eq!(to_n1.iface2_mac, Some("02:00:00:00:00:01".parse().unwrap()));
    assert_eq!(to_n1.iface2_ip4, Some(ipv4!("10.0.0.1")));
    assert_eq!(to_n1.iface2_ip4_mask, Some(24));
    let to_n2 = links.iter().find(|link| link.node2_id == n2.id()).unwrap();
    assert_eq!(to_n2.iface2_ip6, Some(ipv6!("fd00::2")));
    assert_eq!(to_n2.iface2_ip6_mask, Some(64));

    // Hosts themselves report no links; only networks synthesize them.
    assert!(n1.all_link_data(2).is_empty());

    let common = n1.common_nets(&*n2, false);
    assert_eq!(common.len(), 1);
    assert!(Arc::ptr_eq(&common[0].0, &sw));
}

#[test]
fn asymmetric_params_are_reported_in_both_directions() {
    let session = session();
    let n1 = node(&session, "n1");
    let sw = switch(&session, "sw1");

    let ifindex = n1.new_netif(Some(&sw), &[], None, None, None).unwrap();
    let iface = n1.netif(ifindex).unwrap();
    iface.set_params(LinkParams {
        bandwidth: Some(1_000_000),
        ..LinkParams::default()
    });
    iface.set_reverse_params(LinkParams {
        bandwidth: Some(512_000),
        delay: Some(Duration::from_millis(20)),
        ..LinkParams::default()
    });

    let links = sw.all_link_data(2);
    assert_eq!(links.len(), 2);
    assert!(links.iter().all(|link| link.unidirectional));
    assert_eq!(links[0].params.bandwidth, Some(1_000_000));
    assert_eq!(links[1].params.bandwidth, Some(512_000));
    assert_eq!(links[1].params.delay, Some(Duration::from_millis(20)));
    assert_eq!(links[1].node1_id, n1.id());
    assert_eq!(links[1].node2_id, sw.id());
}

#[test]
fn bridged_switches_report_each_other() {
    let session = session();
    let sw1 = switch(&session, "sw1");
    let sw2 = switch(&session, "sw2");

    let bridge = sw1.linknet(&sw2).unwrap();
    assert!(Arc::ptr_eq(&bridge.net().unwrap(), &sw1));
    assert!(Arc::ptr_eq(&bridge.othernet().unwrap(), &sw2));

    let links = sw1.all_link_data(2);
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].node1_id, sw1.id());
    assert_eq!(links[0].node2_id, sw2.id());
    // The peer has not registered the interface, so its index is unknown.
    assert_eq!(links[0].iface2_id, None);
}

#[test]
fn node_data_export() {
    let session = session();
    let n1 = Node::new(
        session.clone(),
        NodeOptions {
            name: Some("router7".to_owned()),
            model: Some("router".to_owned()),
            services: vec!["zebra".to_owned(), "ospfd".to_owned()],
            ..NodeOptions::default()
        },
    );
    n1.set_position(Some(100.0), Some(250.0), None);

    let data = n1.data(1, None, None, None, Some("test")).unwrap();
    assert_eq!(data.name, "router7");
    assert_eq!(data.node_type, NodeType::Default);
    assert_eq!(data.model.as_deref(), Some("router"));
    assert_eq!(data.services.as_deref(), Some("zebra|ospfd"));
    assert_eq!((data.x, data.y), (Some(100.0), Some(250.0)));
    assert_eq!(data.source.as_deref(), Some("test"));
    assert!(data.server.is_none());
}

#[test]
fn session_allocates_distinct_node_ids() {
    let session = session();
    let n1 = node(&session, "n1");
    let n2 = node(&session, "n2");
    let sw = switch(&session, "sw1");
    assert_ne!(n1.id(), n2.id());
    assert_ne!(n2.id(), sw.id());
}
