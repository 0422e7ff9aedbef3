// src/server/search.rs
//! Weighted substring search over the catalog

use crate::repository::{PackageEntry, RepositoryIndex, SearchResult};

pub const NAME_WEIGHT: f64 = 10.0;
pub const DESCRIPTION_WEIGHT: f64 = 5.0;
/// Added once per matching keyword
pub const KEYWORD_WEIGHT: f64 = 3.0;
pub const AUTHOR_WEIGHT: f64 = 2.0;

/// Relevance of `package` for an already lowercased query
fn score(package: &PackageEntry, query: &str) -> f64 {
    let matches = |text: &str| text.to_lowercase().contains(query);

    let mut score = 0.0;
    if matches(&package.name) {
        score += NAME_WEIGHT;
    }
    if matches(&package.description) {
        score += DESCRIPTION_WEIGHT;
    }
    score += package.keywords.iter().filter(|k| matches(k)).count() as f64 * KEYWORD_WEIGHT;
    if matches(&package.author) {
        score += AUTHOR_WEIGHT;
    }
    score
}

/// Packages matching `query`, best first
///
/// Matching is case-insensitive substring containment. Packages scoring
/// zero are dropped; equal scores keep name order.
pub fn search_packages(index: &RepositoryIndex, query: &str) -> Vec<SearchResult> {
    let query = query.to_lowercase();

    let mut results: Vec<SearchResult> = index
        .packages
        .values()
        .filter_map(|package| {
            let score = score(package, &query);
            (score > 0.0).then(|| SearchResult {
                name: package.name.clone(),
                version: package.latest_version.clone(),
                description: package.description.clone(),
                author: package.author.clone(),
                repository: String::new(),
                downloads: package.downloads,
                updated: package.updated,
                score,
            })
        })
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn package(name: &str, description: &str, keywords: &[&str], author: &str) -> PackageEntry {
        PackageEntry {
            name: name.to_string(),
            description: description.to_string(),
            author: author.to_string(),
            license: String::new(),
            homepage: String::new(),
            repository: String::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            versions: Vec::new(),
            latest_version: "1.0.0".to_string(),
            downloads: 0,
            updated: Utc::now(),
        }
    }

    fn index(packages: Vec<PackageEntry>) -> RepositoryIndex {
        let mut index = RepositoryIndex::default();
        for p in packages {
            index.packages.insert(p.name.clone(), p);
        }
        index
    }

    #[test]
    fn test_name_outranks_description() {
        let index = index(vec![
            package("bar", "contains foo", &[], ""),
            package("foo-tools", "", &["foo"], ""),
        ]);

        let results = search_packages(&index, "foo");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "foo-tools");
        assert_eq!(results[0].score, 13.0);
        assert_eq!(results[1].name, "bar");
        assert_eq!(results[1].score, 5.0);
    }

    #[test]
    fn test_case_insensitive_and_zero_score_dropped() {
        let index = index(vec![
            package("Zlib", "Compression LIBRARY", &["ZIP", "deflate"], "Mark"),
            package("other", "", &[], ""),
        ]);

        let results = search_packages(&index, "LIB");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 15.0);

        assert_eq!(search_packages(&index, "mark")[0].score, 2.0);
        assert!(search_packages(&index, "missing").is_empty());
    }

    #[test]
    fn test_every_matching_keyword_counts() {
        let index = index(vec![package("x", "", &["net", "network", "netlink"], "")]);
        assert_eq!(search_packages(&index, "net")[0].score, 9.0);
    }

    #[test]
    fn test_ties_keep_name_order() {
        let index = index(vec![
            package("gamma", "db", &[], ""),
            package("alpha", "db", &[], ""),
            package("beta", "db", &[], ""),
        ]);
        let names: Vec<_> = search_packages(&index, "db")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
    }
}
