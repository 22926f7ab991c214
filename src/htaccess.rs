// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 访问规则引擎
//!
//! 从行式规则文件加载有序的子串匹配规则，并据此决定请求的放行或拒绝。
//!
//! 规则文件格式：每行 `<pattern> <allow|deny>`，空行与 `#` 开头的行被忽略。
//! 评估按文件顺序进行，第一条模式是请求路径子串的规则生效。

use log::{debug, warn};

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

/// 规则动作。无法识别的关键字被保留下来，评估时记录日志并跳过。
#[derive(Debug, Clone, PartialEq)]
pub enum RuleAction {
    Allow,
    Deny,
    Unknown(String),
}

impl From<&str> for RuleAction {
    fn from(keyword: &str) -> Self {
        match keyword {
            "allow" => RuleAction::Allow,
            "deny" => RuleAction::Deny,
            other => RuleAction::Unknown(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pattern: String,
    action: RuleAction,
}

impl Rule {
    pub fn new(pattern: &str, action: RuleAction) -> Self {
        Self {
            pattern: pattern.to_string(),
            action,
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn action(&self) -> &RuleAction {
        &self.action
    }
}

/// 规则评估结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allow,
    Deny,
    NoMatch,
}

impl Decision {
    /// 没有规则命中时隐式放行
    pub fn is_denied(&self) -> bool {
        *self == Decision::Deny
    }
}

/// 路径准入判定接口。
///
/// 当前实现为线性扫描，规则规模变大时可以换成其他匹配结构而不影响调用方。
pub trait PathMatcher: Send + Sync {
    fn evaluate(&self, path: &str) -> Decision;
}

/// 按加载顺序排列的规则集合，加载后只读。
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// 从文件加载规则。
    ///
    /// 只有文件无法打开或读取过程中出现 I/O 错误时返回错误；
    /// 格式不正确的行会被记录并跳过。
    pub fn load(path: &Path) -> io::Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut rules = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if let Some(rule) = parse_line(&line) {
                rules.push(rule);
            }
        }
        debug!("共加载{}条访问规则", rules.len());
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PathMatcher for RuleSet {
    fn evaluate(&self, path: &str) -> Decision {
        for rule in &self.rules {
            if !path.contains(rule.pattern.as_str()) {
                continue;
            }
            match &rule.action {
                RuleAction::Deny => return Decision::Deny,
                RuleAction::Allow => return Decision::Allow,
                RuleAction::Unknown(keyword) => {
                    warn!("未知的访问规则动作：{}（模式：{}）", keyword, rule.pattern);
                }
            }
        }
        Decision::NoMatch
    }
}

fn parse_line(line: &str) -> Option<Rule> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != 2 {
        warn!("无效的访问规则：{}", line);
        return None;
    }
    Some(Rule::new(tokens[0], RuleAction::from(tokens[1])))
}
