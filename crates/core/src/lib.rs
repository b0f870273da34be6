#![doc = include_str!("../README.md")]

pub mod checks;
pub mod config;
pub mod counters;
pub mod error;
pub mod fixture;
pub mod lifecycle;
pub mod metrics;
pub mod provisioner;
pub mod registry;
pub mod state;
pub mod suite;
pub mod trace;
pub mod types;

// --- 주요 타입 re-export ---
// 각 모듈의 핵심 타입을 크레이트 루트에서 바로 사용할 수 있도록 합니다.

// 에러
pub use error::{ConfigError, FixtureError, HarnessError, ProvisionError, StateError};

// 설정
pub use config::HarnessConfig;

// 실행
pub use counters::{Counters, RunReport};
pub use lifecycle::{CaseOutcome, LifecycleRunner, StageOutcome, StageSelection};
pub use suite::{RunOutcome, SuiteRunner};

// 검사 / 프로비저닝
pub use checks::{CheckContext, CheckDescriptor, CheckError};
pub use provisioner::{ProvisionOptions, Provisioner, TerraformCli};
pub use registry::Registry;

// 도메인 타입
pub use trace::{CallSite, Severity};
pub use types::{CaseFlags, Stage, SuiteDef, TestCase, Vars};
