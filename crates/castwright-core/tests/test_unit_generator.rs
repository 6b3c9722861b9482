// Integration tests for byte-bounded unit generation

mod common;

#[cfg(test)]
mod unit_generator_tests {
    use super::common::{single_voice_adapter, squash, FakeSpeechBackend};
    use castwright_core::{OversizeReason, RunContext, RunIssue, UnitGenerator};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn generator(backend: Arc<FakeSpeechBackend>, ceiling: u64, min_split: usize) -> UnitGenerator {
        UnitGenerator::new(Arc::new(single_voice_adapter(backend)), ceiling, min_split)
    }

    fn sentences(count: usize) -> String {
        "The cell divides. ".repeat(count).trim().to_string()
    }

    #[tokio::test]
    async fn test_unit_under_ceiling_is_accepted_whole() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 1));

        let batch = generator(backend.clone(), 10_000, 400)
            .generate(0, 1, &sentences(20), 1, &ctx)
            .await
            .unwrap();

        assert_eq!(batch.units.len(), 1);
        assert_eq!(batch.units[0].sequence, 1);
        assert_eq!(batch.next_seq, 2);
        assert_eq!(batch.attempts, 1);
        assert!(batch.issues.is_empty());
        assert!(batch.units[0].path.exists());
    }

    #[tokio::test]
    async fn test_oversized_unit_bisects_once() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 1));
        let text = sentences(128);
        assert!(text.len() > 2_300);

        let batch = generator(backend.clone(), 1_200, 400)
            .generate(2, 1, &text, 1, &ctx)
            .await
            .unwrap();

        assert_eq!(batch.units.len(), 2);
        assert_eq!(batch.attempts, 3);
        assert_eq!(
            batch.units.iter().map(|u| u.sequence).collect::<Vec<_>>(),
            [1, 2]
        );
        assert!(batch.units.iter().all(|u| u.bytes <= 1_200 && u.depth == 1));
        assert!(batch.issues.is_empty());

        // Halves cover the text in order
        let calls = backend.calls();
        let accepted: String = calls[1..].iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(squash(&accepted), squash(&text));
    }

    #[tokio::test]
    async fn test_discarded_attempts_leave_no_files() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 1));

        let batch = generator(backend, 1_000, 400)
            .generate(0, 3, &sentences(300), 1, &ctx)
            .await
            .unwrap();

        let mut names: Vec<String> = std::fs::read_dir(ctx.segment_dir(0))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        assert_eq!(names.len(), batch.units.len());
        assert!(names.iter().all(|n| n.starts_with("unit_c003_")));
    }

    #[tokio::test]
    async fn test_every_unit_fits_or_is_below_split_minimum() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 3));
        let text = sentences(450);

        let batch = generator(backend, 1_500, 400)
            .generate(1, 1, &text, 7, &ctx)
            .await
            .unwrap();

        for unit in &batch.units {
            assert!(unit.bytes <= 1_500 || unit.source_chars < 400);
        }
        let sequences: Vec<usize> = batch.units.iter().map(|u| u.sequence).collect();
        let expected: Vec<usize> = (7..7 + batch.units.len()).collect();
        assert_eq!(sequences, expected);
        assert_eq!(batch.next_seq, 7 + batch.units.len());

        // Each bisection adds one discarded attempt and one extra unit
        assert_eq!(batch.attempts, 2 * batch.units.len() - 1);
    }

    #[tokio::test]
    async fn test_oversized_short_text_is_accepted_and_reported() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 10));
        let text = sentences(15);
        assert!(text.chars().count() < 400);

        let batch = generator(backend, 100, 400)
            .generate(4, 2, &text, 1, &ctx)
            .await
            .unwrap();

        assert_eq!(batch.units.len(), 1);
        assert!(batch.units[0].oversized);
        assert_eq!(batch.attempts, 1);
        match &batch.issues[..] {
            [RunIssue::OversizeUnresolved { segment_index, label, ceiling, reason, .. }] => {
                assert_eq!(*segment_index, 4);
                assert_eq!(label, "c002");
                assert_eq!(*ceiling, 100);
                assert_eq!(*reason, OversizeReason::BelowSplitMinimum);
            }
            other => panic!("unexpected issues: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_depth_limit_stops_bisection_and_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 10));
        let text = sentences(100);

        let batch = generator(backend, 100, 2)
            .with_max_depth(1)
            .generate(0, 1, &text, 1, &ctx)
            .await
            .unwrap();

        assert_eq!(batch.units.len(), 2);
        assert_eq!(batch.attempts, 3);
        assert!(batch.units.iter().all(|u| u.oversized));
        assert_eq!(batch.issues.len(), 2);
        for issue in &batch.issues {
            match issue {
                RunIssue::OversizeUnresolved { chars, reason, .. } => {
                    assert_eq!(*reason, OversizeReason::DepthLimit);
                    assert!(*chars >= 2);
                    assert!(issue.summary().contains("depth limit"));
                    assert!(!issue.summary().contains("split minimum"));
                }
                other => panic!("unexpected issue: {other:?}"),
            }
        }
        assert!(batch.units.iter().all(|u| u.depth == 1));
        assert!(batch.units.iter().map(|u| u.source_chars).sum::<usize>() <= text.chars().count());
    }

    #[tokio::test]
    async fn test_failed_half_is_skipped_and_numbering_stays_contiguous() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 1).poisoned_by("POISON", 1_000));
        let text = format!("{} POISON ends here. {}", sentences(70), sentences(70));

        let batch = generator(backend, 1_000, 400)
            .generate(0, 1, &text, 1, &ctx)
            .await
            .unwrap();

        assert!(batch
            .issues
            .iter()
            .any(|i| matches!(i, RunIssue::AllEnginesExhausted { segment_index: 0, .. })));
        assert!(!batch.units.is_empty());
        let sequences: Vec<usize> = batch.units.iter().map(|u| u.sequence).collect();
        assert_eq!(sequences, (1..=batch.units.len()).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_blank_text_produces_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let ctx = RunContext::create(temp_dir.path(), "episode").unwrap();
        let backend = Arc::new(FakeSpeechBackend::new("fake", 1));

        let batch = generator(backend.clone(), 1_000, 400)
            .generate(0, 1, "   \n ", 5, &ctx)
            .await
            .unwrap();

        assert!(batch.units.is_empty());
        assert_eq!(batch.next_seq, 5);
        assert!(backend.calls().is_empty());
    }
}
