//! Code quality scoring from file-listing heuristics.
//!
//! No source is parsed. Each sub-score is derived from the presence of
//! well-known files (lint configs, manifests, CI workflows, security policies)
//! and from the README text.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::clamp_score;
use crate::github::{QualitySignals, RepositorySignal};

/// Relative weight of each code quality sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CodeQualityWeights {
    pub complexity: f64,
    pub maintainability: f64,
    pub test_coverage: f64,
    pub documentation: f64,
    pub code_style: f64,
    pub dependencies: f64,
    pub security: f64,
}

impl Default for CodeQualityWeights {
    fn default() -> Self {
        Self {
            complexity: 0.15,
            maintainability: 0.20,
            test_coverage: 0.15,
            documentation: 0.15,
            code_style: 0.15,
            dependencies: 0.10,
            security: 0.10,
        }
    }
}

impl CodeQualityWeights {
    pub fn total(&self) -> f64 {
        self.complexity
            + self.maintainability
            + self.test_coverage
            + self.documentation
            + self.code_style
            + self.dependencies
            + self.security
    }
}

/// Code quality sub-scores and their weighted aggregate, all in [0, 100].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeQualityBreakdown {
    pub complexity: f64,
    pub maintainability: f64,
    pub test_coverage: f64,
    pub documentation: f64,
    pub code_style: f64,
    pub dependencies: f64,
    pub security: f64,
    pub overall: f64,
    /// True when no file listing was available and scores were estimated
    /// from the search snapshot alone.
    pub estimated: bool,
}

impl CodeQualityBreakdown {
    #[allow(clippy::too_many_arguments)]
    fn weighted(
        weights: &CodeQualityWeights,
        complexity: f64,
        maintainability: f64,
        test_coverage: f64,
        documentation: f64,
        code_style: f64,
        dependencies: f64,
        security: f64,
        estimated: bool,
    ) -> Self {
        let complexity = clamp_score(complexity);
        let maintainability = clamp_score(maintainability);
        let test_coverage = clamp_score(test_coverage);
        let documentation = clamp_score(documentation);
        let code_style = clamp_score(code_style);
        let dependencies = clamp_score(dependencies);
        let security = clamp_score(security);

        let total = weights.total();
        let overall = if total > 0.0 {
            (complexity * weights.complexity
                + maintainability * weights.maintainability
                + test_coverage * weights.test_coverage
                + documentation * weights.documentation
                + code_style * weights.code_style
                + dependencies * weights.dependencies
                + security * weights.security)
                / total
        } else {
            0.0
        };

        Self {
            complexity,
            maintainability,
            test_coverage,
            documentation,
            code_style,
            dependencies,
            security,
            overall: clamp_score(overall),
            estimated,
        }
    }
}

/// Score code quality from a file listing. `size_kb` is the best known
/// repository size.
pub fn evaluate(
    quality: &QualitySignals,
    size_kb: u64,
    weights: &CodeQualityWeights,
) -> CodeQualityBreakdown {
    CodeQualityBreakdown::weighted(
        weights,
        complexity_score(size_kb),
        maintainability_score(quality),
        test_coverage_score(quality),
        documentation_score(quality),
        code_style_score(quality),
        dependency_score(quality),
        security_score(quality),
        false,
    )
}

/// Estimate code quality when no file listing is known.
pub fn estimate(
    signal: &RepositorySignal,
    size_kb: u64,
    weights: &CodeQualityWeights,
) -> CodeQualityBreakdown {
    let description_len = signal.description.as_deref().map_or(0, |d| d.trim().len());

    let mut maintainability = 50.0_f64;
    if signal.license.is_some() {
        maintainability += 10.0;
    }
    if description_len > 0 {
        maintainability += 10.0;
    }
    if signal.archived {
        maintainability -= 15.0;
    }

    let mut documentation = 30.0_f64;
    documentation += match description_len {
        0 => 0.0,
        1..=39 => 10.0,
        _ => 20.0,
    };
    documentation += match signal.topics.len() {
        0 => 0.0,
        1 | 2 => 5.0,
        _ => 10.0,
    };

    let dependencies = if signal.language.is_some() { 50.0 } else { 30.0 };

    CodeQualityBreakdown::weighted(
        weights,
        complexity_score(size_kb),
        maintainability,
        40.0,
        documentation,
        50.0,
        dependencies,
        30.0,
        true,
    )
}

/// Smaller repositories are assumed simpler to reason about.
pub fn complexity_score(size_kb: u64) -> f64 {
    match size_kb {
        0..=5_000 => 90.0,
        5_001..=25_000 => 70.0,
        25_001..=100_000 => 40.0,
        _ => 20.0,
    }
}

const CI_ROOT_FILES: &[&str] = &[
    ".travis.yml",
    ".gitlab-ci.yml",
    "azure-pipelines.yml",
    "Jenkinsfile",
    "appveyor.yml",
    ".drone.yml",
];

const SOURCE_DIRS: &[&str] = &["src", "lib", "pkg", "cmd", "app", "internal", "crates"];

pub fn maintainability_score(quality: &QualitySignals) -> f64 {
    let mut score = 30.0_f64;

    let has_ci = !quality.workflow_files.is_empty()
        || quality.has_root_dir(".circleci")
        || CI_ROOT_FILES.iter().any(|f| quality.has_root_file(f));
    if has_ci {
        score += 20.0;
    }
    if quality.has_root_prefix("contributing") || quality.has_github_file("CONTRIBUTING.md") {
        score += 15.0;
    }
    if quality.has_root_prefix("changelog")
        || quality.has_root_prefix("changes")
        || quality.has_root_prefix("history")
    {
        score += 10.0;
    }
    if quality.has_root_file(".editorconfig") || quality.has_root_file(".gitattributes") {
        score += 10.0;
    }
    if SOURCE_DIRS.iter().any(|d| quality.has_root_dir(d)) {
        score += 15.0;
    }

    score.min(100.0)
}

const TEST_DIRS: &[&str] = &["test", "tests", "spec", "__tests__", "testing", "e2e"];

const TEST_RUNNER_PREFIXES: &[&str] = &[
    "jest.config",
    "vitest.config",
    "karma.conf",
    "pytest.ini",
    "tox.ini",
    "conftest.py",
    "noxfile.py",
    "phpunit.xml",
    ".mocharc",
];

const COVERAGE_PREFIXES: &[&str] = &["codecov.yml", ".codecov.yml", ".coveragerc", ".nycrc"];

pub fn test_coverage_score(quality: &QualitySignals) -> f64 {
    let mut score = 0.0_f64;

    if TEST_DIRS.iter().any(|d| quality.has_root_dir(d)) {
        score += 40.0;
    }
    if TEST_RUNNER_PREFIXES
        .iter()
        .any(|p| quality.has_root_prefix(p))
    {
        score += 20.0;
    }
    if COVERAGE_PREFIXES.iter().any(|p| quality.has_root_prefix(p))
        || quality.has_github_file("codecov.yml")
        || quality.has_workflow_matching("coverage")
    {
        score += 20.0;
    }
    if quality.has_workflow_matching("test") || quality.has_workflow_matching("ci") {
        score += 20.0;
    }

    if score == 0.0 {
        10.0
    } else {
        score.min(100.0)
    }
}

const STYLE_PREFIXES: &[&str] = &[
    ".eslintrc",
    "eslint.config",
    ".prettierrc",
    "prettier.config",
    "rustfmt.toml",
    ".rustfmt.toml",
    "clippy.toml",
    ".clippy.toml",
    ".flake8",
    ".pylintrc",
    "ruff.toml",
    ".ruff.toml",
    ".golangci",
    ".rubocop.yml",
    ".clang-format",
    ".clang-tidy",
    "biome.json",
    ".stylelintrc",
    "tslint.json",
    ".swiftlint.yml",
    ".scalafmt.conf",
    ".pre-commit-config.yaml",
];

pub fn code_style_score(quality: &QualitySignals) -> f64 {
    let found = STYLE_PREFIXES
        .iter()
        .filter(|p| quality.has_root_prefix(p))
        .count();
    match found {
        0 => 40.0,
        n => (70.0 + 10.0 * (n as f64 - 1.0)).min(100.0),
    }
}

const MANIFESTS: &[&str] = &[
    "package.json",
    "requirements.txt",
    "Pipfile",
    "setup.py",
    "Cargo.toml",
    "go.mod",
    "pyproject.toml",
    "pom.xml",
    "build.gradle",
    "Gemfile",
    "composer.json",
];

const LOCKFILES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "Pipfile.lock",
    "Cargo.lock",
    "go.sum",
    "poetry.lock",
    "Gemfile.lock",
    "composer.lock",
];

/// +15 per dependency manifest, +20 for any lockfile, +10 for security
/// scanning config, capped at 100.
pub fn dependency_score(quality: &QualitySignals) -> f64 {
    let manifests = MANIFESTS
        .iter()
        .filter(|m| quality.has_root_file(m))
        .count();
    let mut score = 15.0 * manifests as f64;

    if LOCKFILES.iter().any(|l| quality.has_root_file(l)) {
        score += 20.0;
    }
    if quality.has_root_file(".snyk")
        || quality.has_root_file("security.md")
        || quality.has_github_file("FUNDING.yml")
    {
        score += 10.0;
    }

    score.min(100.0)
}

/// +20 per security policy (root and `.github`), +15 for dependabot, +15
/// for a code scanning workflow. Repositories with none of these get 30.
pub fn security_score(quality: &QualitySignals) -> f64 {
    let mut score = 0.0_f64;

    if quality.has_root_file("SECURITY.md") {
        score += 20.0;
    }
    if quality.has_github_file("SECURITY.md") {
        score += 20.0;
    }
    if quality.has_github_file("dependabot.yml")
        || quality.has_github_file("dependabot.yaml")
        || quality.has_workflow_matching("dependabot")
    {
        score += 15.0;
    }
    if quality.has_workflow_matching("codeql") || quality.has_workflow_matching("security") {
        score += 15.0;
    }

    if score == 0.0 {
        30.0
    } else {
        score
    }
}

/// Documentation score: README analysis plus a bonus for a `docs/` tree.
pub fn documentation_score(quality: &QualitySignals) -> f64 {
    let mut score = match quality.readme.as_deref() {
        Some(text) => analyze_readme(text).score,
        None if quality.has_readme() => README_BASE_SCORE,
        None => 0.0,
    };
    if quality.has_root_dir("docs") || quality.has_root_dir("doc") {
        score += 10.0;
    }
    clamp_score(score)
}

const README_BASE_SCORE: f64 = 40.0;

/// Section and readability findings for one README.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadmeAnalysis {
    pub length: usize,
    pub has_installation: bool,
    pub has_usage: bool,
    pub has_contributing: bool,
    pub has_license: bool,
    pub has_code_examples: bool,
    pub readability: f64,
    pub score: f64,
}

struct ReadmePatterns {
    installation: Regex,
    usage: Regex,
    contributing: Regex,
    license: Regex,
    code_block: Regex,
    sentence_end: Regex,
}

static README_PATTERNS: LazyLock<Option<ReadmePatterns>> = LazyLock::new(|| {
    Some(ReadmePatterns {
        installation: Regex::new(r"#{1,3}.*instal").ok()?,
        usage: Regex::new(r"#{1,3}.*us(age|e)").ok()?,
        contributing: Regex::new(r"#{1,3}.*contribut").ok()?,
        license: Regex::new(r"#{1,3}.*licens").ok()?,
        code_block: Regex::new(r"```[\s\S]*?```").ok()?,
        sentence_end: Regex::new(r"[.!?]+").ok()?,
    })
});

/// Analyze README text.
///
/// Base 40 for having a README; +15 installation, +10 usage, +10
/// contributing, +15 fenced code example, +10 license heading; plus
/// `(readability - 50) / 2` where readability is 90/70/50/30 for an average
/// sentence length of at most 15/25/40 words or longer.
pub fn analyze_readme(text: &str) -> ReadmeAnalysis {
    let empty = ReadmeAnalysis {
        length: text.len(),
        has_installation: false,
        has_usage: false,
        has_contributing: false,
        has_license: false,
        has_code_examples: false,
        readability: 0.0,
        score: 0.0,
    };
    if text.trim().is_empty() {
        return empty;
    }
    let Some(patterns) = README_PATTERNS.as_ref() else {
        return ReadmeAnalysis {
            score: README_BASE_SCORE,
            ..empty
        };
    };

    let lower = text.to_lowercase();
    let has_installation = patterns.installation.is_match(&lower);
    let has_usage = patterns.usage.is_match(&lower);
    let has_contributing = patterns.contributing.is_match(&lower);
    let has_license = patterns.license.is_match(&lower);
    let has_code_examples = patterns.code_block.is_match(text);

    let sentences = patterns.sentence_end.find_iter(text).count().max(1);
    let words = text.split_whitespace().count();
    let avg_sentence_length = words as f64 / sentences as f64;
    let readability = if avg_sentence_length <= 15.0 {
        90.0
    } else if avg_sentence_length <= 25.0 {
        70.0
    } else if avg_sentence_length <= 40.0 {
        50.0
    } else {
        30.0
    };

    let mut score = README_BASE_SCORE;
    if has_installation {
        score += 15.0;
    }
    if has_usage {
        score += 10.0;
    }
    if has_contributing {
        score += 10.0;
    }
    if has_code_examples {
        score += 15.0;
    }
    if has_license {
        score += 10.0;
    }
    score += (readability - 50.0) / 2.0;

    ReadmeAnalysis {
        length: text.len(),
        has_installation,
        has_usage,
        has_contributing,
        has_license,
        has_code_examples,
        readability,
        score: clamp_score(score),
    }
}
