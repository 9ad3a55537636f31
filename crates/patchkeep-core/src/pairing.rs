//! Resolution of connect/disconnect selections into concrete port pairs.
//!
//! A selection is a list of [`Connectable`]s, each a single port or a client
//! bundle. Both functions here are pure: the same input order always yields
//! the same pairs, and every pair is a well-formed [`Connection`].

use crate::client::Connectable;
use crate::connection::Connection;
use crate::port::Port;

fn outlet_ports(selection: &[Connectable]) -> impl Iterator<Item = &Port> {
    selection.iter().flat_map(Connectable::ports).filter(|p| p.is_outlet())
}

fn inlet_ports(selection: &[Connectable]) -> impl Iterator<Item = &Port> {
    selection.iter().flat_map(Connectable::ports).filter(|p| p.is_inlet())
}

/// Positional pairing used for connecting.
///
/// Each side is flattened in selection order, then zipped. The longer side is
/// truncated without notice, and a zipped pair whose types differ is skipped
/// rather than realigned.
#[must_use]
pub fn pair_ports(outlets: &[Connectable], inlets: &[Connectable]) -> Vec<Connection> {
    outlet_ports(outlets)
        .zip(inlet_ports(inlets))
        .filter_map(|(outlet, inlet)| Connection::between(outlet.clone(), inlet.clone()))
        .collect()
}

/// Cross-product pairing used for disconnecting.
///
/// Tears down every edge a previous [`pair_ports`] over the same selections
/// could have produced, whatever the order it was made in.
#[must_use]
pub fn pair_all(outlets: &[Connectable], inlets: &[Connectable]) -> Vec<Connection> {
    let inlets: Vec<&Port> = inlet_ports(inlets).collect();

    outlet_ports(outlets)
        .flat_map(|outlet| {
            inlets
                .iter()
                .filter_map(move |inlet| Connection::between(outlet.clone(), (*inlet).clone()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::client::group_clients;
    use crate::port::{ConnectionType, PortDirection};

    fn port(full_name: &str, direction: PortDirection, connection_type: ConnectionType) -> Port {
        Port::from_full_name(full_name, direction, connection_type, 0).expect("valid name")
    }

    fn outlet(full_name: &str) -> Connectable {
        port(full_name, PortDirection::Out, ConnectionType::Audio).into()
    }

    fn inlet(full_name: &str) -> Connectable {
        port(full_name, PortDirection::In, ConnectionType::Audio).into()
    }

    fn names(pairs: &[Connection]) -> Vec<String> {
        pairs.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_pair_ports_positional() {
        let pairs = pair_ports(&[outlet("a:o1"), outlet("a:o2")], &[inlet("b:i1"), inlet("b:i2")]);
        assert_eq!(names(&pairs), vec!["a:o1 -> b:i1", "a:o2 -> b:i2"]);
    }

    #[test]
    fn test_pair_ports_truncates_to_shorter_side() {
        let pairs = pair_ports(&[outlet("a:o1")], &[inlet("b:i1"), inlet("b:i2")]);
        assert_eq!(names(&pairs), vec!["a:o1 -> b:i1"]);
    }

    #[test]
    fn test_pair_ports_client_bundles() {
        let ports = vec![
            port("synth:L", PortDirection::Out, ConnectionType::Audio),
            port("synth:R", PortDirection::Out, ConnectionType::Audio),
            port("system:playback_1", PortDirection::In, ConnectionType::Audio),
            port("system:playback_2", PortDirection::In, ConnectionType::Audio),
        ];
        let clients = group_clients(&ports, ConnectionType::Audio);

        let pairs = pair_ports(&[clients[0].clone().into()], &[clients[1].clone().into()]);

        assert_eq!(
            names(&pairs),
            vec!["synth:L -> system:playback_1", "synth:R -> system:playback_2"]
        );
    }

    #[test]
    fn test_pair_ports_skips_type_mismatch_without_realigning() {
        let outlets = [outlet("a:o1"), outlet("a:o2")];
        let inlets: [Connectable; 2] =
            [port("b:midi", PortDirection::In, ConnectionType::Midi).into(), inlet("b:i2")];

        let pairs = pair_ports(&outlets, &inlets);

        assert_eq!(names(&pairs), vec!["a:o2 -> b:i2"]);
    }

    #[test]
    fn test_pair_ports_ignores_wrong_direction() {
        let pairs = pair_ports(&[inlet("a:i"), outlet("a:o")], &[outlet("b:o"), inlet("b:i")]);
        assert_eq!(names(&pairs), vec!["a:o -> b:i"]);
    }

    #[test]
    fn test_pair_all_filters_cross_type() {
        let inlets: [Connectable; 2] =
            [inlet("b:i1"), port("b:i2", PortDirection::In, ConnectionType::Midi).into()];

        let pairs = pair_all(&[outlet("a:o1")], &inlets);

        assert_eq!(names(&pairs), vec!["a:o1 -> b:i1"]);
    }

    #[test]
    fn test_pair_all_cross_product() {
        let pairs = pair_all(&[outlet("a:o1"), outlet("a:o2")], &[inlet("b:i1"), inlet("b:i2")]);
        assert_eq!(
            names(&pairs),
            vec!["a:o1 -> b:i1", "a:o1 -> b:i2", "a:o2 -> b:i1", "a:o2 -> b:i2"]
        );
    }

    #[test]
    fn test_empty_selections() {
        assert!(pair_ports(&[], &[inlet("b:i")]).is_empty());
        assert!(pair_all(&[outlet("a:o")], &[]).is_empty());
    }

    fn arb_port(direction: PortDirection) -> impl Strategy<Value = Port> {
        ("[a-c]", "[a-z]{1,4}", prop::bool::ANY).prop_map(move |(client, name, midi)| {
            let connection_type = if midi { ConnectionType::Midi } else { ConnectionType::Audio };
            Port::from_full_name(&format!("{client}:{name}"), direction, connection_type, 0)
                .expect("generated name has a colon")
        })
    }

    fn arb_selection() -> impl Strategy<Value = Vec<Connectable>> {
        prop::collection::vec(
            prop_oneof![arb_port(PortDirection::Out), arb_port(PortDirection::In)]
                .prop_map(Connectable::Port),
            0..6,
        )
    }

    proptest! {
        #[test]
        fn prop_pairs_are_well_formed(outlets in arb_selection(), inlets in arb_selection()) {
            for pair in pair_ports(&outlets, &inlets).iter().chain(pair_all(&outlets, &inlets).iter()) {
                let (o, i) = (pair.outlet().expect("outlet"), pair.inlet().expect("inlet"));
                prop_assert!(o.is_outlet());
                prop_assert!(i.is_inlet());
                prop_assert_eq!(o.connection_type(), i.connection_type());
            }
        }

        #[test]
        fn prop_pair_ports_bounded_by_shorter_side(outlets in arb_selection(), inlets in arb_selection()) {
            let outs = outlets.iter().flat_map(Connectable::ports).filter(|p| p.is_outlet()).count();
            let ins = inlets.iter().flat_map(Connectable::ports).filter(|p| p.is_inlet()).count();
            prop_assert!(pair_ports(&outlets, &inlets).len() <= outs.min(ins));
        }

        #[test]
        fn prop_pair_all_covers_pair_ports(outlets in arb_selection(), inlets in arb_selection()) {
            let all = pair_all(&outlets, &inlets);
            for pair in pair_ports(&outlets, &inlets) {
                prop_assert!(all.contains(&pair));
            }
        }
    }
}
