//! 테스트 케이스 레지스트리
//!
//! 사람이 읽을 수 있는 케이스 이름을 [`TestCase`] 정의에 매핑하고,
//! 전역 검사 목록과 스위트 목록, 기본 변수를 함께 보관합니다.

use std::collections::BTreeMap;

use tracing::debug;

use crate::checks::{self, CheckDescriptor};
use crate::config::{CaseConfig, HarnessConfig};
use crate::error::{ConfigError, HarnessError};
use crate::types::{CaseFlags, SuiteDef, TestCase, Vars};

/// 내장 SQL 모듈 케이스 이름
pub const SQL_MODULE_CASE: &str = "Deploying SQL module";
/// 내장 스위트 설명
pub const SQL_MODULE_SUITE: &str = " Test the Cloud SQL module functions ";

/// 케이스 레지스트리
#[derive(Debug, Clone, Default)]
pub struct Registry {
    cases: BTreeMap<String, TestCase>,
    global_checks: Vec<CheckDescriptor>,
    suites: Vec<SuiteDef>,
    defaults: Vars,
}

impl Registry {
    /// 빈 레지스트리를 만듭니다.
    pub fn new(defaults: Vars) -> Self {
        Self {
            defaults,
            ..Self::default()
        }
    }

    /// 설정으로부터 레지스트리를 구성합니다.
    ///
    /// 내장 케이스(활성화 시) → 설정 파일 케이스 순서로 등록하며 같은 이름이면
    /// 설정 파일 쪽이 덮어씁니다. 스위트가 정의되지 않았으면 내장 스위트를
    /// 사용합니다. 알 수 없는 검사 이름이나 케이스 이름은 설정 에러입니다.
    pub fn from_config(config: &HarnessConfig) -> Result<Self, HarnessError> {
        let mut registry = Self::new(config.defaults.as_vars());

        if config.builtin.enabled {
            registry.register(SQL_MODULE_CASE, sql_module_case(&config.builtin.module_dir));
        }

        for (i, name) in config.global.checks.iter().enumerate() {
            let check = checks::find(name).ok_or_else(|| {
                HarnessError::from(ConfigError::InvalidValue {
                    field: format!("global.checks[{i}]"),
                    reason: format!("unknown check '{name}'"),
                })
            })?;
            registry.add_global_check(check);
        }

        for (i, case_cfg) in config.cases.iter().enumerate() {
            let case = case_from_config(case_cfg).map_err(|name| {
                HarnessError::from(ConfigError::InvalidValue {
                    field: format!("cases[{i}].checks"),
                    reason: format!("unknown check '{name}'"),
                })
            })?;
            registry.register(&case_cfg.name, case);
        }

        if config.suites.is_empty() {
            if config.builtin.enabled {
                registry.add_suite(SuiteDef {
                    description: SQL_MODULE_SUITE.to_owned(),
                    cases: vec![SQL_MODULE_CASE.to_owned()],
                });
            }
        } else {
            for suite in &config.suites {
                registry.add_suite(SuiteDef {
                    description: suite.description.clone(),
                    cases: suite.cases.clone(),
                });
            }
        }

        registry.verify_suites()?;
        Ok(registry)
    }

    /// 케이스를 등록합니다. 같은 이름이 있으면 대체합니다.
    pub fn register(&mut self, name: &str, case: TestCase) {
        debug!(case = name, "registering test case");
        self.cases.insert(name.to_owned(), case);
    }

    /// 전역 검사를 추가합니다.
    pub fn add_global_check(&mut self, check: CheckDescriptor) {
        debug!(check = check.name, "registering global check");
        self.global_checks.push(check);
    }

    /// 스위트를 추가합니다.
    pub fn add_suite(&mut self, suite: SuiteDef) {
        self.suites.push(suite);
    }

    /// 이름으로 케이스를 찾습니다. 없는 이름은 프로그래밍/설정 에러입니다.
    pub fn lookup(&self, name: &str) -> Result<&TestCase, HarnessError> {
        self.cases
            .get(name)
            .ok_or_else(|| HarnessError::UnknownCase(name.to_owned()))
    }

    /// 케이스에 없는 기본 변수(region, project, name_prefix, 계정 정보)를 채운
    /// 사본을 반환합니다. 케이스에 명시된 값이 우선합니다.
    pub fn apply_defaults(&self, case: &TestCase) -> TestCase {
        let mut case = case.clone();
        for (key, value) in &self.defaults {
            case.vars
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        case
    }

    /// 전역 검사 목록
    pub fn global_checks(&self) -> &[CheckDescriptor] {
        &self.global_checks
    }

    /// 스위트 목록
    pub fn suites(&self) -> &[SuiteDef] {
        &self.suites
    }

    /// 등록된 케이스 (이름순)
    pub fn cases(&self) -> impl Iterator<Item = (&str, &TestCase)> {
        self.cases.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn verify_suites(&self) -> Result<(), HarnessError> {
        for (i, suite) in self.suites.iter().enumerate() {
            for name in &suite.cases {
                if !self.cases.contains_key(name) {
                    return Err(ConfigError::InvalidValue {
                        field: format!("suites[{i}].cases"),
                        reason: format!("unknown case '{name}'"),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// 내장 "Deploying SQL module" 케이스
pub fn sql_module_case(module_dir: &std::path::Path) -> TestCase {
    TestCase::new(SQL_MODULE_CASE, module_dir)
        .with_var("db_name", "test_postgres")
        .with_flags(CaseFlags {
            run_global_checks: false,
            run_local_checks: true,
        })
        .with_check(checks::POSTGRES_EXISTENCE)
}

fn case_from_config(cfg: &CaseConfig) -> Result<TestCase, String> {
    let local_checks = cfg
        .checks
        .iter()
        .map(|name| checks::find(name).ok_or_else(|| name.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(TestCase {
        description: cfg.description.clone().unwrap_or_else(|| cfg.name.clone()),
        module_dir: cfg.module_dir.clone(),
        vars: cfg.vars.clone(),
        flags: CaseFlags {
            run_global_checks: cfg.run_global_checks,
            run_local_checks: cfg.run_local_checks,
        },
        local_checks,
        copy_file: cfg.copy_file.clone(),
        module_source: cfg.module_source.clone(),
        module_vars: cfg.module_vars.clone(),
    })
}
