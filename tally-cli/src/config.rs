use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use tally_core::{Classifier, RuleSet};
use tally_ingest::handlers::{BbtConfig, UsaaConfig};
use tally_ingest::{HandlerConfig, ProbeLimits};

use crate::state::ensure_tally_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub detect: DetectSection,
    pub bbt: BbtConfig,
    pub usaa: UsaaConfig,
    pub classifier: ClassifierSection,
    pub batch: BatchSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectSection {
    /// Lines read from the top of a file during detection.
    pub probe_lines: usize,
    pub probe_line_bytes: usize,
}

impl Default for DetectSection {
    fn default() -> Self {
        let limits = ProbeLimits::default();
        Self {
            probe_lines: limits.lines,
            probe_line_bytes: limits.bytes_per_line,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSection {
    /// TOML rules file; the built-in rules are used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSection {
    pub workers: usize,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

impl Config {
    pub fn probe_limits(&self) -> ProbeLimits {
        ProbeLimits {
            lines: self.detect.probe_lines,
            bytes_per_line: self.detect.probe_line_bytes,
        }
    }

    pub fn handlers(&self) -> HandlerConfig {
        HandlerConfig {
            bbt: self.bbt.clone(),
            usaa: self.usaa.clone(),
        }
    }

    pub fn classifier(&self) -> Result<Classifier> {
        let rules = match &self.classifier.rules {
            Some(path) => RuleSet::load(path).with_context(|| format!("load rules {}", path.display()))?,
            None => RuleSet::builtin().context("parse built-in rules")?,
        };
        Ok(Classifier::new(rules))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tally_home()?.join("config.toml"))
}

/// Load `path`, or the default location when `None`. A missing file yields
/// the defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    if cfg.detect.probe_lines == 0 || cfg.detect.probe_line_bytes == 0 {
        bail!(
            "{}: [detect] probe_lines and probe_line_bytes must be at least 1",
            p.display()
        );
    }
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config(path: Option<&Path>) -> Result<()> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => config_path()?,
    };
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let cfg = load_config(Some(&dir.path().join("nope.toml"))).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.probe_limits(), ProbeLimits::default());
        assert_eq!(cfg.batch.workers, 4);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "[bbt]\naccounts = [7389]\n\n[detect]\nprobe_lines = 3\n").unwrap();

        let cfg = load_config(Some(&p)).unwrap();
        assert_eq!(cfg.bbt.accounts, vec![7389]);
        assert_eq!(cfg.bbt.file_prefix, "Acct_");
        assert_eq!(cfg.probe_limits().lines, 3);
        assert_eq!(cfg.probe_limits().bytes_per_line, 9000);
    }

    #[test]
    fn test_zero_detect_limits_are_rejected() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("config.toml");
        for body in ["[detect]\nprobe_lines = 0\n", "[detect]\nprobe_line_bytes = 0\n"] {
            fs::write(&p, body).unwrap();
            let err = load_config(Some(&p)).unwrap_err();
            assert!(err.to_string().contains("at least 1"), "{err}");
        }
    }

    #[test]
    fn test_init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let p = dir.path().join("config.toml");
        init_config(Some(&p)).unwrap();
        assert_eq!(load_config(Some(&p)).unwrap(), Config::default());
    }

    #[test]
    fn test_custom_rules_file() {
        let dir = TempDir::new().unwrap();
        let rules = dir.path().join("rules.toml");
        fs::write(&rules, "[[rule]]\npattern = \"coffee\"\ncategory = \"RESTAURANTS\"\n").unwrap();

        let cfg = Config {
            classifier: ClassifierSection { rules: Some(rules) },
            ..Config::default()
        };
        let classifier = cfg.classifier().unwrap();
        assert_eq!(classifier.classify("Morning COFFEE"), tally_core::Category::Restaurants);
        assert_eq!(classifier.classify("LEGIT EMPLOYER SALARY"), tally_core::Category::Unknown);
    }
}
