//! Prefix-search behavior over a store populated at scale.

use groovy_index::{SymbolInfo, SymbolKind, SymbolStore};
use std::path::PathBuf;
use std::time::Instant;
use tempfile::TempDir;

/// Populate many files' worth of symbols through the per-file write path,
/// then exercise prefix scans for soundness, completeness and order.
#[test]
fn prefix_search_stays_fast_and_exact_at_scale() {
    let dir = TempDir::new().unwrap();
    let store = SymbolStore::new();
    store
        .initialize(&dir.path().join("index"), 256 * 1024 * 1024)
        .unwrap();

    const FILES: usize = 200;
    const CLASSES_PER_FILE: usize = 10;

    for file in 0..FILES {
        let path = PathBuf::from(format!("src/pkg{:03}/File{file}.groovy", file % 20));
        let mut symbols = Vec::new();
        for class in 0..CLASSES_PER_FILE {
            let name = format!("pkg{:03}.Class{file}x{class}", file % 20);
            symbols.push(
                SymbolInfo::new(name.as_str(), SymbolKind::Class, &path, 1 + class as i64, 1)
                    .unwrap(),
            );
            for member in 0..4 {
                symbols.push(
                    SymbolInfo::new(
                        format!("{name}.member{member}"),
                        SymbolKind::Method,
                        &path,
                        2 + member as i64,
                        5,
                    )
                    .unwrap(),
                );
            }
        }
        store.replace_file_symbols(&path, &symbols).unwrap();
    }

    let total = FILES as u64 * CLASSES_PER_FILE as u64 * 5;
    assert_eq!(store.symbol_count().unwrap(), total);

    // Narrow prefix: exactly one package's classes and members.
    let started = Instant::now();
    let hits = store.search("pkg007.").unwrap();
    let narrow_elapsed = started.elapsed();
    assert!(!hits.is_empty());
    assert!(hits.iter().all(|s| s.name().starts_with("pkg007.")));
    let expected = store
        .search("")
        .unwrap()
        .iter()
        .filter(|s| s.name().starts_with("pkg007."))
        .count();
    assert_eq!(hits.len(), expected);

    // Results come back in key order, which is byte order over names here.
    let names: Vec<&str> = hits.iter().map(|s| s.name()).collect();
    let mut sorted = names.clone();
    sorted.sort_unstable_by(|a, b| {
        // Keys append ':'-delimited fields after the name.
        let ka = format!("{a}:");
        let kb = format!("{b}:");
        ka.cmp(&kb)
    });
    assert_eq!(names, sorted);

    // Wall-clock sanity; generous bound to stay robust on loaded machines.
    assert!(
        narrow_elapsed.as_millis() < 2_000,
        "prefix scan took {narrow_elapsed:?}"
    );

    // A repeated query is served from the result cache.
    let started = Instant::now();
    let cached = store.search("pkg007.").unwrap();
    assert_eq!(cached.len(), hits.len());
    assert!(started.elapsed() <= narrow_elapsed.max(std::time::Duration::from_millis(50)));

    store.close();
}
