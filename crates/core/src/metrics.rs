//! 메트릭 상수 및 설명 등록
//!
//! 하네스가 기록하는 메트릭의 이름과 설명을 중앙에서 정의합니다.
//! recorder를 설치하지 않으면 `metrics` 매크로 호출은 아무 일도 하지 않으므로,
//! tfprobe를 라이브러리로 임베드하는 프로세스만 recorder를 설치하면 됩니다.
//!
//! # 네이밍 컨벤션
//!
//! - 접두어: `tfprobe_`
//! - 접미어: `_total` (counter), `_seconds` (histogram)

use metrics::{describe_counter, describe_histogram};

// ─── 레이블 키 상수 ────────────────────────────────────────────────

/// 스테이지 레이블 키 (deploy, verify, destroy)
pub const LABEL_STAGE: &str = "stage";

/// 결과 레이블 키 (pass, fail)
pub const LABEL_RESULT: &str = "result";

/// 검사 이름 레이블 키
pub const LABEL_CHECK: &str = "check";

// ─── 하네스 메트릭 ─────────────────────────────────────────────────

/// 실행된 케이스 수 (counter)
pub const CASES_TOTAL: &str = "tfprobe_cases_total";

/// 실행된 검사 메서드 수 (counter, labels: check, result)
pub const METHODS_TOTAL: &str = "tfprobe_methods_total";

/// 치명적 스테이지 실패 수 (counter, label: stage)
pub const STAGE_FAILURES_TOTAL: &str = "tfprobe_stage_failures_total";

/// 스테이지 소요 시간 (histogram, 초, label: stage)
pub const STAGE_DURATION_SECONDS: &str = "tfprobe_stage_duration_seconds";

/// 모든 메트릭의 설명을 등록합니다.
///
/// recorder 설치 직후 한 번 호출합니다.
pub fn describe_metrics() {
    describe_counter!(CASES_TOTAL, "Total number of test cases started");
    describe_counter!(
        METHODS_TOTAL,
        "Total number of verification methods run, labelled by result"
    );
    describe_counter!(
        STAGE_FAILURES_TOTAL,
        "Total number of fatal deploy/verify/destroy stage failures"
    );
    describe_histogram!(
        STAGE_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Wall-clock duration of each lifecycle stage"
    );
}
