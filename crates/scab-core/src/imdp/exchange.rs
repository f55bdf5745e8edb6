//! PRISM explicit-model exchange files.
//!
//! ```text
//! <prefix>.sta   (x)              <prefix>.tra   <states> <choices> <transitions>
//!                0:(0)                           1 0 0 [0.0012,0.0301] a_0
//!                1:(1)                           1 0 1 [0.8931,1] a_0
//! <prefix>.lab   0="init" 1="deadlock" 2="reached" 3="critical"
//!                0: 1
//!                1: 0
//! ```
//!
//! Interval rows carry `[low,high]`; point-estimate rows carry a single
//! probability. Absorbing self-loops have no action label.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use scab_common::{Error, Result};
use scab_config::MdpMode;
use serde::Serialize;

use super::{Choice, IntervalMdp, StateId};
use crate::intervals::ProbabilityInterval;

const LABEL_HEADER: &str = r#"0="init" 1="deadlock" 2="reached" 3="critical""#;
const LABEL_INIT: u32 = 0;
const LABEL_DEADLOCK: u32 = 1;
const LABEL_REACHED: u32 = 2;
const LABEL_CRITICAL: u32 = 3;

/// Paths of one written model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeFiles {
    pub sta: PathBuf,
    pub lab: PathBuf,
    pub tra: PathBuf,
    pub pctl: PathBuf,
}

impl ExchangeFiles {
    pub fn new(dir: &Path, prefix: &str) -> Self {
        Self {
            sta: dir.join(format!("{prefix}.sta")),
            lab: dir.join(format!("{prefix}.lab")),
            tra: dir.join(format!("{prefix}.tra")),
            pctl: dir.join(format!("{prefix}.pctl")),
        }
    }

    /// `a.tra,a.sta,a.lab` argument of `-importmodel`.
    pub fn import_argument(&self) -> String {
        let base = self.tra.with_extension("");
        format!("{}.tra,sta,lab", base.display())
    }
}

/// Reach-avoid property: stay out of critical states until a target is
/// reached, within `horizon` steps when bounded.
pub fn property(mode: MdpMode, horizon: Option<u32>) -> String {
    let operator = match mode {
        MdpMode::Interval => "Pmaxmin",
        MdpMode::Estimate => "Pmax",
    };
    let until = match horizon {
        Some(t) => format!("U<={t}"),
        None => "U".to_string(),
    };
    format!(r#"{operator}=? [ !"critical" {until} "reached" ]"#)
}

/// Write `.sta`, `.lab`, `.tra` and `.pctl` into `dir`.
pub fn write_exchange(
    mdp: &IntervalMdp,
    dir: &Path,
    prefix: &str,
    horizon: Option<u32>,
) -> Result<ExchangeFiles> {
    mdp.check_intervals()?;
    fs::create_dir_all(dir)?;
    let files = ExchangeFiles::new(dir, prefix);

    fs::write(&files.sta, render_states(mdp))?;
    fs::write(&files.lab, render_labels(mdp))?;
    fs::write(&files.tra, render_transitions(mdp))?;
    fs::write(&files.pctl, property(mdp.mode(), horizon) + "\n")?;
    Ok(files)
}

fn render_states(mdp: &IntervalMdp) -> String {
    let mut out = String::from("(x)\n");
    for s in 0..mdp.num_states() {
        let _ = writeln!(out, "{s}:({s})");
    }
    out
}

fn render_labels(mdp: &IntervalMdp) -> String {
    let mut out = format!("{LABEL_HEADER}\n");
    for s in 0..mdp.num_states() as StateId {
        let mut labels = Vec::new();
        if mdp.initial_states().contains(&s) {
            labels.push(LABEL_INIT);
        }
        if s == 0 {
            labels.push(LABEL_DEADLOCK);
        }
        if mdp.target_states().contains(&s) {
            labels.push(LABEL_REACHED);
        }
        if mdp.critical_states().contains(&s) {
            labels.push(LABEL_CRITICAL);
        }
        if !labels.is_empty() {
            let ids: Vec<String> = labels.iter().map(u32::to_string).collect();
            let _ = writeln!(out, "{s}: {}", ids.join(" "));
        }
    }
    out
}

fn render_transitions(mdp: &IntervalMdp) -> String {
    let mut out = format!(
        "{} {} {}\n",
        mdp.num_states(),
        mdp.num_choices(),
        mdp.num_transitions()
    );
    for s in 0..mdp.num_states() as StateId {
        for (c, choice) in mdp.choices(s).iter().enumerate() {
            for (t, interval) in &choice.transitions {
                let _ = write!(out, "{s} {c} {t} ");
                match mdp.mode() {
                    MdpMode::Interval => {
                        let _ = write!(out, "[{},{}]", interval.low, interval.high);
                    }
                    MdpMode::Estimate => {
                        let _ = write!(out, "{}", interval.low);
                    }
                }
                if let Some(a) = choice.action {
                    let _ = write!(out, " a_{a}");
                }
                out.push('\n');
            }
        }
    }
    out
}

/// Read a model written by [`write_exchange`] back into memory.
pub fn parse_exchange(dir: &Path, prefix: &str) -> Result<IntervalMdp> {
    let files = ExchangeFiles::new(dir, prefix);
    let malformed = |path: &Path, reason: String| Error::MalformedResult {
        path: path.display().to_string(),
        reason,
    };

    let sta = fs::read_to_string(&files.sta)?;
    let states = sta
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .count();

    let tra = fs::read_to_string(&files.tra)?;
    let mut lines = tra.lines();
    let header: Vec<usize> = lines
        .next()
        .unwrap_or_default()
        .split_whitespace()
        .map(str::parse)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| malformed(&files.tra, format!("bad header: {e}")))?;
    if header.len() != 3 || header[0] != states {
        return Err(malformed(
            &files.tra,
            format!("header {header:?} does not match {states} states"),
        ));
    }

    let mut choices: Vec<Vec<Choice>> = vec![Vec::new(); states];
    let mut mode = None;
    for (n, line) in lines.enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row = parse_row(line)
            .map_err(|reason| malformed(&files.tra, format!("line {}: {reason}", n + 2)))?;
        if *mode.get_or_insert(row.mode) != row.mode {
            return Err(malformed(
                &files.tra,
                format!("line {}: mixes interval and point rows", n + 2),
            ));
        }
        let state = choices.get_mut(row.source as usize).ok_or_else(|| {
            malformed(&files.tra, format!("line {}: unknown state {}", n + 2, row.source))
        })?;
        if row.choice == state.len() {
            state.push(Choice {
                action: row.action,
                transitions: Vec::new(),
            });
        } else if row.choice + 1 != state.len() {
            return Err(malformed(
                &files.tra,
                format!("line {}: choice {} out of order", n + 2, row.choice),
            ));
        }
        if let Some(current) = state.last_mut() {
            current.transitions.push((row.target, row.interval));
        }
    }

    let mut mdp = IntervalMdp {
        mode: mode.unwrap_or_default(),
        choices,
        initial: BTreeSet::new(),
        targets: BTreeSet::new(),
        critical: BTreeSet::new(),
    };
    if mdp.num_choices() != header[1] || mdp.num_transitions() != header[2] {
        return Err(malformed(
            &files.tra,
            format!(
                "header declares {} choices and {} transitions, found {} and {}",
                header[1],
                header[2],
                mdp.num_choices(),
                mdp.num_transitions()
            ),
        ));
    }

    let lab = fs::read_to_string(&files.lab)?;
    for (n, line) in lab.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let (state, ids) = line
            .split_once(':')
            .ok_or_else(|| malformed(&files.lab, format!("line {}: missing ':'", n + 1)))?;
        let state: StateId = state
            .trim()
            .parse()
            .map_err(|e| malformed(&files.lab, format!("line {}: {e}", n + 1)))?;
        for id in ids.split_whitespace() {
            match id.parse::<u32>() {
                Ok(LABEL_INIT) => {
                    mdp.initial.insert(state);
                }
                Ok(LABEL_REACHED) => {
                    mdp.targets.insert(state);
                }
                Ok(LABEL_CRITICAL) => {
                    mdp.critical.insert(state);
                }
                Ok(LABEL_DEADLOCK) => {}
                _ => {
                    return Err(malformed(
                        &files.lab,
                        format!("line {}: unknown label '{id}'", n + 1),
                    ))
                }
            }
        }
    }
    Ok(mdp)
}

struct Row {
    source: StateId,
    choice: usize,
    target: StateId,
    interval: ProbabilityInterval,
    action: Option<u32>,
    mode: MdpMode,
}

fn parse_row(line: &str) -> std::result::Result<Row, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(4..=5).contains(&fields.len()) {
        return Err(format!("expected 4 or 5 fields, got {}", fields.len()));
    }
    let int = |s: &str| s.parse::<u32>().map_err(|e| format!("'{s}': {e}"));
    let float = |s: &str| s.parse::<f64>().map_err(|e| format!("'{s}': {e}"));

    let (interval, mode) = match fields[3]
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    {
        Some(inner) => {
            let (lo, hi) = inner
                .split_once(',')
                .ok_or_else(|| format!("'{}' is not [low,high]", fields[3]))?;
            (
                ProbabilityInterval::new(float(lo)?, float(hi)?),
                MdpMode::Interval,
            )
        }
        None => (ProbabilityInterval::point(float(fields[3])?), MdpMode::Estimate),
    };
    let action = match fields.get(4) {
        Some(label) => {
            let id = label
                .strip_prefix("a_")
                .ok_or_else(|| format!("action label '{label}' lacks the a_ prefix"))?;
            Some(int(id)?)
        }
        None => None,
    };

    Ok(Row {
        source: int(fields[0])?,
        choice: int(fields[1])? as usize,
        target: int(fields[2])?,
        interval,
        action,
        mode,
    })
}
