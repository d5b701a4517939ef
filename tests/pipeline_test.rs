//! End-to-end checks of the load -> decode -> graph -> serialize pipeline
//! against the sample datasets in `tests/fixtures/stix`.

use rustc_hash::FxHashSet;
use std::collections::BTreeSet;
use std::path::PathBuf;
use stixmap::dot::safe_id;
use stixmap::filter::ObjectFilter;
use stixmap::{
    build_graph, default_decoders, external_id, graph_to_dot, graph_to_triples, load, stix_type_from_id,
    CompositeSource, Decoder, DecoderOptions, DotOptions, GraphOptions, MemorySource, StixError, StixObject,
    Triple, TripleOptions,
};

const DATASETS: [&str; 5] = [
    "attack-enterprise",
    "attack-to-nist-sp-800-53",
    "capec",
    "mbc",
    "nist-sp-800-53",
];

const T1059: &str = "attack-pattern--7385dfaf-6886-4229-9ecd-6fd678040830";
const T1566: &str = "attack-pattern--a62a8db3-f23a-4d8f-afd6-9dbc77e7813b";
const MATRIX: &str = "x-mitre-matrix--eafc1b4c-5e56-4965-bd4e-66a6a89c88cc";
const INITIAL_ACCESS: &str = "x-mitre-tactic--ffd5bcee-6e16-4dd2-8eca-7b3beedf33ca";
const EXECUTION: &str = "x-mitre-tactic--4ca45d45-df4d-4613-8980-bac22d278fa5";

fn fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/fixtures/stix");
    path.push(format!("{}.json", name));
    path.to_string_lossy().into_owned()
}

fn dataset(name: &str) -> MemorySource {
    load(&fixture(name)).unwrap().with_name(name)
}

fn object(value: serde_json::Value) -> StixObject {
    StixObject::from_value(value).unwrap()
}

fn triple_set(graph: &stixmap::StixGraph) -> BTreeSet<Triple> {
    graph_to_triples(graph, TripleOptions::default()).into_iter().collect()
}

#[test]
fn test_id_prefix_matches_declared_type_in_every_dataset() {
    for name in DATASETS {
        let source = dataset(name);
        assert!(!source.is_empty(), "{} has no objects", name);
        for o in source.query() {
            assert_eq!(Some(stix_type_from_id(o.id())), o.declared_type(), "{}", o.id());
        }
    }
}

#[test]
fn test_decoding_is_deterministic() {
    let source = dataset("attack-enterprise");
    let decoders = default_decoders(DecoderOptions {
        include_identities: true,
        include_markings: true,
        expand_external_references: true,
    });

    let first = build_graph(source.query(), &decoders, GraphOptions::default());
    let second = build_graph(source.query(), &decoders, GraphOptions::default());
    assert_eq!(triple_set(&first), triple_set(&second));
    assert_eq!(first.summary(), second.summary());
}

#[test]
fn test_dot_declares_each_endpoint_once() {
    let source = dataset("attack-enterprise");
    let graph = build_graph(source.query(), &default_decoders(DecoderOptions::default()), GraphOptions::default());
    let dot = graph_to_dot(&graph, &DotOptions::default());

    let declarations = dot
        .lines()
        .filter(|line| line.contains(" [label=") && !line.contains(" -> "))
        .count();
    let endpoints: FxHashSet<String> = graph_to_triples(&graph, TripleOptions::default())
        .iter()
        .flat_map(|t| [safe_id(&t.subject), safe_id(&t.object)])
        .collect();
    assert_eq!(declarations, endpoints.len());
}

#[test]
fn test_dangling_reference_removal_is_a_fixed_point() {
    let source = dataset("attack-enterprise");
    let decoders = default_decoders(DecoderOptions::default());

    let kept = build_graph(source.query(), &decoders, GraphOptions { drop_dangling_references: false });
    let mut graph = build_graph(source.query(), &decoders, GraphOptions::default());
    assert!(kept.contains("malware--00000000-0000-4000-8000-000000000000"));
    assert!(!graph.contains("malware--00000000-0000-4000-8000-000000000000"));
    assert_eq!(kept.edge_count(), graph.edge_count() + 1);

    let present: FxHashSet<String> = source.query().iter().map(|o| o.id().to_string()).collect();
    let (nodes, edges) = (graph.node_count(), graph.edge_count());
    assert_eq!(graph.drop_dangling_references(&present), 0);
    assert_eq!((graph.node_count(), graph.edge_count()), (nodes, edges));
}

#[test]
fn test_generic_decoder_on_a_single_relationship() {
    let objects = vec![object(serde_json::json!({
        "type": "relationship",
        "id": "relationship--1",
        "relationship_type": "uses",
        "source_ref": "malware--a",
        "target_ref": "attack-pattern--b"
    }))];

    let triples = Decoder::generic(DecoderOptions::default()).iter_triples(&objects);
    assert_eq!(triples, vec![Triple::new("malware--a", "uses", "attack-pattern--b")]);
}

#[test]
fn test_matrix_tactics_and_kill_chain_phases() {
    let source = dataset("attack-enterprise");
    let graph = build_graph(source.query(), &default_decoders(DecoderOptions::default()), GraphOptions::default());
    let triples = triple_set(&graph);

    assert!(triples.contains(&Triple::new(INITIAL_ACCESS, "related-to", MATRIX)));
    assert!(triples.contains(&Triple::new(EXECUTION, "related-to", MATRIX)));
    assert_eq!(triples.iter().filter(|t| t.object == MATRIX).count(), 2);

    // The unknown "not-a-tactic" phase is skipped; the known one still links
    assert!(triples.contains(&Triple::new(T1059, "related-to", EXECUTION)));
    assert!(triples.contains(&Triple::new(T1566, "related-to", INITIAL_ACCESS)));
    assert_eq!(
        triples
            .iter()
            .filter(|t| t.subject == T1059 && t.predicate == "related-to")
            .count(),
        1
    );
}

#[test]
fn test_external_ids_across_datasets() {
    let nist = dataset("nist-sp-800-53");
    let ac1 = nist
        .get("course-of-action--6c2dd5a0-4b8e-4b5a-9d0c-4f1c2b3a5d01")
        .unwrap();
    assert_eq!(external_id(ac1).unwrap(), "AC-1");

    let attack = dataset("attack-enterprise");
    assert_eq!(external_id(attack.get(T1566).unwrap()).unwrap(), "T1566");
    // Matrices are ATT&CK objects without a usable external id
    assert!(matches!(
        external_id(attack.get(MATRIX).unwrap()),
        Err(StixError::ExternalIdNotFound { .. })
    ));

    let capec = dataset("capec");
    let sqli = capec.get("attack-pattern--42acc604-a86c-46f7-bd03-6e532c02d85e").unwrap();
    assert_eq!(external_id(sqli).unwrap(), "CAPEC-66");

    let mbc = dataset("mbc");
    let method = mbc.get("malware-method--2a6b2a43-1e8c-4f0f-8c0a-7d1c2b3a4e03").unwrap();
    assert_eq!(external_id(method).unwrap(), "E1027.m02");

    let stray = object(serde_json::json!({"id": "x-custom--1", "type": "x-custom"}));
    let err = external_id(&stray).unwrap_err();
    assert!(matches!(err, StixError::UnknownExternalId { .. }));
    assert!(err.is_recoverable());
}

#[test]
fn test_lifecycle_filter_on_attack_dataset() {
    let source = dataset("attack-enterprise");
    let decoders = default_decoders(DecoderOptions::default());

    let kept = ObjectFilter::new().apply(source.query().to_vec(), &decoders);
    assert_eq!(kept.len(), source.len() - 2);
    assert!(kept.iter().all(|o| o.id() != "tool--ff6caf67-ea1f-4895-b80e-4bb0fc31c6db"));

    let everything = ObjectFilter::new()
        .include_deprecated(true)
        .include_revoked(true)
        .apply(source.query().to_vec(), &decoders);
    assert_eq!(everything.len(), source.len());
}

#[test]
fn test_mapping_edges_connect_datasets() {
    let sources: CompositeSource = vec![
        dataset("attack-enterprise"),
        dataset("nist-sp-800-53"),
        dataset("attack-to-nist-sp-800-53"),
    ]
    .into_iter()
    .collect();
    let graph = build_graph(&sources.query(), &default_decoders(DecoderOptions::default()), GraphOptions::default());

    let si3 = "course-of-action--6c2dd5a0-4b8e-4b5a-9d0c-4f1c2b3a5d03";
    assert!(triple_set(&graph).contains(&Triple::new(si3, "mitigates", T1059)));
    assert_eq!(sources.dataset_of(si3), Some("nist-sp-800-53"));
    assert_eq!(sources.dataset_of(T1059), Some("attack-enterprise"));

    let summary = graph.summary();
    assert_eq!(
        summary.total_edges_by_type.get("course-of-action,mitigates,attack-pattern"),
        Some(&3)
    );
}

#[test]
fn test_mbc_behaviours_and_methods() {
    let source = dataset("mbc");
    let graph = build_graph(source.query(), &default_decoders(DecoderOptions::default()), GraphOptions::default());

    assert_eq!(
        triple_set(&graph),
        BTreeSet::from([
            Triple::new(
                "malware-behavior--2a6b2a43-1e8c-4f0f-8c0a-7d1c2b3a4e02",
                "related-to",
                "malware-objective--2a6b2a43-1e8c-4f0f-8c0a-7d1c2b3a4e01",
            ),
            Triple::new(
                "malware-method--2a6b2a43-1e8c-4f0f-8c0a-7d1c2b3a4e03",
                "related-to",
                "malware-behavior--2a6b2a43-1e8c-4f0f-8c0a-7d1c2b3a4e02",
            ),
        ])
    );
}

#[test]
fn test_external_reference_pseudo_nodes() {
    let source = dataset("capec");
    let decoders = default_decoders(DecoderOptions { expand_external_references: true, ..Default::default() });
    let pseudo = "28bc1867-f461-591c-ba64-673a046655dd";
    let link = Triple::new("attack-pattern--42acc604-a86c-46f7-bd03-6e532c02d85e", "related-to", pseudo);

    // Pseudo-nodes are not input objects, so they count as dangling
    let graph = build_graph(source.query(), &decoders, GraphOptions::default());
    assert!(!graph.contains(pseudo));
    assert!(!triple_set(&graph).contains(&link));

    let kept = build_graph(source.query(), &decoders, GraphOptions { drop_dangling_references: false });
    assert!(kept.contains(pseudo));
    assert!(triple_set(&kept).contains(&link));
}
