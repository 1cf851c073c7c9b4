//! Workload classification from process name and pid
//!
//! Classification is a pure lookup over an ordered rule table: the first rule
//! whose pattern occurs in the lowercased process name wins. Host-managed
//! processes with very low pids classify as system when no earlier rule
//! matched.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Workload type of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Interactive,
    ComputeIntensive,
    IoIntensive,
    SecurityTool,
    /// Protected / educational workloads
    Protected,
    System,
    Unknown,
}

impl Classification {
    /// Number of variants, used to normalise the ordinal feature.
    pub const COUNT: usize = 7;

    pub fn ordinal(&self) -> usize {
        match self {
            Classification::Interactive => 0,
            Classification::ComputeIntensive => 1,
            Classification::IoIntensive => 2,
            Classification::SecurityTool => 3,
            Classification::Protected => 4,
            Classification::System => 5,
            Classification::Unknown => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Interactive => "interactive",
            Classification::ComputeIntensive => "compute-intensive",
            Classification::IoIntensive => "io-intensive",
            Classification::SecurityTool => "security-tool",
            Classification::Protected => "protected",
            Classification::System => "system",
            Classification::Unknown => "unknown",
        }
    }

    /// Protected profiles are derived from this at creation.
    pub fn is_protected(&self) -> bool {
        matches!(self, Classification::Protected)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the rule table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub class: Classification,
    /// Case-insensitive name substrings
    pub patterns: Vec<String>,
}

impl ClassificationRule {
    pub fn new(class: Classification, patterns: &[&str]) -> Self {
        Self {
            class,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    fn matches(&self, lowercase_name: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| !p.is_empty() && lowercase_name.contains(p.to_lowercase().as_str()))
    }
}

/// Rule table as read from the `[classifier]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Pids at or below this are host-managed and classify as system
    pub system_pid_ceiling: u32,
    /// Evaluated in order; first match wins
    pub rules: Vec<ClassificationRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            system_pid_ceiling: 100,
            rules: vec![
                ClassificationRule::new(
                    Classification::Protected,
                    &[
                        "educ", "learn", "tutor", "classroom", "gcompris", "kturtle", "kalzium",
                        "kstars", "stellarium", "scratch", "geogebra", "tuxmath", "tuxtype",
                    ],
                ),
                ClassificationRule::new(
                    Classification::SecurityTool,
                    &[
                        "metasploit", "msfconsole", "nmap", "wireshark", "tshark", "tcpdump",
                        "burpsuite", "sqlmap", "hashcat", "john", "hydra", "aircrack", "nikto",
                        "zaproxy", "ettercap", "bettercap", "gobuster",
                    ],
                ),
                ClassificationRule::new(
                    Classification::Interactive,
                    &[
                        "firefox", "chrome", "chromium", "vscode", "code-oss", "codium",
                        "gnome-shell", "plasmashell",
                        "kwin", "xorg", "xwayland", "terminal", "konsole", "alacritty", "kitty",
                        "nautilus", "dolphin", "vlc", "mpv", "discord", "slack", "libreoffice",
                    ],
                ),
                ClassificationRule::new(
                    Classification::System,
                    &[
                        "systemd", "kthreadd", "kworker", "ksoftirqd", "migration", "rcu_",
                        "dbus", "udevd", "journald", "sshd", "cron", "polkit", "networkmanager",
                    ],
                ),
                ClassificationRule::new(
                    Classification::ComputeIntensive,
                    &[
                        "rustc", "cc1", "gcc", "clang", "ffmpeg", "blender", "x264", "x265",
                        "handbrake", "matlab", "octave", "stress",
                    ],
                ),
                ClassificationRule::new(
                    Classification::IoIntensive,
                    &[
                        "rsync", "postgres", "mysqld", "mariadbd", "mongod", "bsdtar",
                        "updatedb", "btrfs", "restic", "borg",
                    ],
                ),
            ],
        }
    }
}

/// Ordered, data-driven classifier.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify a process. Pure: depends only on the inputs and the table.
    pub fn classify(&self, name: &str, pid: u32) -> Classification {
        let lowercase = name.to_lowercase();
        for rule in &self.config.rules {
            // The low-pid check shares the system rule's priority slot.
            if rule.class == Classification::System && pid <= self.config.system_pid_ceiling {
                return Classification::System;
            }
            if rule.matches(&lowercase) {
                return rule.class;
            }
        }
        if pid <= self.config.system_pid_ceiling {
            return Classification::System;
        }
        Classification::Unknown
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_security_tool_by_name() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.classify("metasploit_gui", 4242),
            Classification::SecurityTool
        );
        assert_eq!(classifier.classify("NMAP", 5000), Classification::SecurityTool);
    }

    #[test]
    fn test_priority_order() {
        let classifier = Classifier::default();
        // Protected outranks security-tool
        assert_eq!(
            classifier.classify("education-wireshark-lab", 5000),
            Classification::Protected
        );
        // Interactive outranks the low-pid system rule
        assert_eq!(classifier.classify("firefox", 42), Classification::Interactive);
        // Low pid without an earlier match is system
        assert_eq!(classifier.classify("mystery", 7), Classification::System);
        assert_eq!(classifier.classify("systemd-logind", 900), Classification::System);
    }

    #[test]
    fn test_fallthrough_unknown() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("xmrig-worker", 31337), Classification::Unknown);
        assert_eq!(classifier.classify("", 31337), Classification::Unknown);
    }

    #[test]
    fn test_extended_classes() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("rustc", 8000), Classification::ComputeIntensive);
        assert_eq!(classifier.classify("postgres", 8000), Classification::IoIntensive);
    }

    #[test]
    fn test_editor_patterns_do_not_catch_codecs() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify("code-oss", 8000), Classification::Interactive);
        assert_eq!(classifier.classify("vscode-server", 8000), Classification::Interactive);
        assert_eq!(classifier.classify("ffmpeg-encoder", 8000), Classification::ComputeIntensive);
        assert_eq!(classifier.classify("gst-decoder", 8000), Classification::Unknown);
        assert_eq!(classifier.classify("xcode-helper", 8000), Classification::Unknown);
    }

    #[test]
    fn test_classify_is_pure() {
        let classifier = Classifier::default();
        let inputs = [("metasploit_gui", 4242), ("firefox", 10), ("unknown-bin", 9000)];
        let first: Vec<_> = inputs.iter().map(|(n, p)| classifier.classify(n, *p)).collect();
        let reversed: Vec<_> = inputs
            .iter()
            .rev()
            .map(|(n, p)| classifier.classify(n, *p))
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        assert_eq!(first, reversed);
        assert_eq!(first, inputs.iter().map(|(n, p)| classifier.classify(n, *p)).collect::<Vec<_>>());
    }

    #[test]
    fn test_custom_table() {
        let config = ClassifierConfig {
            system_pid_ceiling: 0,
            rules: vec![ClassificationRule::new(Classification::ComputeIntensive, &["Miner"])],
        };
        let classifier = Classifier::new(config);
        assert_eq!(classifier.classify("xmrig-MINER", 1), Classification::ComputeIntensive);
        assert_eq!(classifier.classify("firefox", 1), Classification::Unknown);
    }

    #[test]
    fn test_protected_flag_derivation() {
        assert!(Classification::Protected.is_protected());
        assert!(!Classification::System.is_protected());
        assert_eq!(Classification::Unknown.ordinal(), Classification::COUNT - 1);
    }
}
