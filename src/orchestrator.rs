//! Runs the crawl across every requested section.

use crate::analysis::merge::ResultMerger;
use crate::analysis::{KeywordExtractor, SentimentAnalyzer};
use crate::browser::{Page, PageDriver};
use crate::config::CrawlConfig;
use crate::models::{AnalyzedPost, Section, SectionSummary};
use crate::scrapers::cutoff::Window;
use crate::scrapers::navigator::Navigator;
use crate::scrapers::pagination::SectionCrawler;
use chrono::NaiveDate;
use tracing::{error, info, instrument};

/// Posts from all sections in crawl order, plus one summary per section.
#[derive(Debug, Default)]
pub struct CrawlOutput {
    pub posts: Vec<AnalyzedPost>,
    pub sections: Vec<SectionSummary>,
}

#[derive(Debug)]
pub struct Orchestrator<'a, S, K> {
    config: &'a CrawlConfig,
    window: Window,
    today: NaiveDate,
    merger: ResultMerger<S, K>,
}

impl<'a, S, K> Orchestrator<'a, S, K>
where
    S: SentimentAnalyzer,
    K: KeywordExtractor,
{
    /// # Arguments
    ///
    /// * `config` - Site and crawl settings
    /// * `window` - Time window applied to every section
    /// * `today` - Date used to complete partial dates such as `M月D日`
    /// * `merger` - Analysis applied to each admitted post
    pub fn new(
        config: &'a CrawlConfig,
        window: Window,
        today: NaiveDate,
        merger: ResultMerger<S, K>,
    ) -> Self {
        Self {
            config,
            window,
            today,
            merger,
        }
    }

    /// Crawl `sections` in order.
    ///
    /// A section that cannot be navigated to is logged and skipped. Posts are
    /// not deduplicated across sections.
    #[instrument(level = "info", skip_all, fields(sections = sections.len()))]
    pub async fn run<D: PageDriver>(&self, page: &mut Page<D>, sections: &[Section]) -> CrawlOutput {
        let navigator = Navigator::new(self.config);
        let mut output = CrawlOutput::default();

        for section in sections {
            if !navigator.navigate_to_section(page, section).await {
                error!(section = %section.label, "Navigation failed; skipping section");
                output.sections.push(SectionSummary {
                    label: section.label.clone(),
                    navigated: false,
                    outcome: None,
                    posts: 0,
                });
                continue;
            }

            let crawler = SectionCrawler::new(
                &section.label,
                self.window,
                self.today,
                self.config,
                &self.merger,
            );
            let run = crawler.run(page).await;
            info!(
                section = %section.label,
                posts = run.posts.len(),
                rounds = run.rounds,
                outcome = ?run.outcome,
                "Section crawled"
            );
            output.sections.push(SectionSummary {
                label: section.label.clone(),
                navigated: true,
                outcome: Some(run.outcome),
                posts: run.posts.len(),
            });
            output.posts.extend(run.posts);
        }

        info!(total = output.posts.len(), "Crawl finished");
        output
    }
}
