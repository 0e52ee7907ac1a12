use rand::seq::SliceRandom;
use std::ops::RangeInclusive;

/// Dynamic/private port range (RFC 6335).
pub const PRIVATE_PORTS: RangeInclusive<u16> = 49152..=65535;

/// Suggest a random port in `ports` that is not in `exclude`.
///
/// Returns `None` when every port in the range is excluded (or the range is
/// empty). The port is not probed; callers binding it must still handle
/// `AddrInUse`.
pub fn random_port_in_range_excluding(ports: RangeInclusive<u16>, exclude: &[u16]) -> Option<u16> {
	let available: Vec<u16> = ports.filter(|p| !exclude.contains(p)).collect();
	available.choose(&mut rand::thread_rng()).copied()
}

pub fn random_port_in_range(ports: RangeInclusive<u16>) -> Option<u16> {
	random_port_in_range_excluding(ports, &[])
}

pub fn random_private_port_excluding(exclude: &[u16]) -> Option<u16> {
	random_port_in_range_excluding(PRIVATE_PORTS, exclude)
}

pub fn random_private_port() -> Option<u16> {
	random_private_port_excluding(&[])
}
