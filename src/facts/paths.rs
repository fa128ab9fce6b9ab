use rand::Rng;

use super::{CrimeFacts, DiscoveryPath};

/// Paths kept beyond the configured initial count.
const EXTRA_PATHS: usize = 3;

/// Build the initial discovery paths for a case.
///
/// One path per conspirator and per evidence item, then the timeline and
/// outside-witness routes, padded with generic paths up to `initial_count`
/// and capped at `initial_count + 3`.
pub fn seed_discovery_paths<R: Rng + ?Sized>(
    crime: &CrimeFacts,
    initial_count: usize,
    rng: &mut R,
) -> Vec<DiscoveryPath> {
    let mut paths = Vec::new();

    for conspirator in &crime.conspirators {
        paths.push(
            DiscoveryPath::new(
                format!("path_conspirator_{}", conspirator.name),
                format!("Catch {} in a lie or contradiction", conspirator.name),
                rng.gen_range(4..=8),
            )
            .with_character(conspirator.name.clone()),
        );
    }

    for evidence in &crime.evidence {
        paths.push(
            DiscoveryPath::new(
                format!("path_evidence_{}", evidence.id),
                format!("Discover true meaning of {}", evidence.description),
                rng.gen_range(5..=9),
            )
            .with_evidence(evidence.id.clone()),
        );
    }

    paths.push(DiscoveryPath::new(
        "path_timeline",
        "Notice timeline inconsistencies between conspirator accounts",
        7,
    ));
    paths.push(DiscoveryPath::new(
        "path_external_witness",
        "Find an unexpected witness who saw something",
        6,
    ));

    while paths.len() < initial_count {
        let n = paths.len();
        paths.push(DiscoveryPath::new(
            format!("path_generic_{}", n),
            format!("Generic investigation path {}", n),
            rng.gen_range(5..=8),
        ));
    }

    paths.truncate(initial_count + EXTRA_PATHS);
    paths
}
