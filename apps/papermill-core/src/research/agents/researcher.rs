use crate::runlog::RunLog;
use async_trait::async_trait;
use papermill_arxiv::ArxivClient;
use papermill_types::Paper;

/// Relevance-ranked bibliographic search.
#[async_trait]
pub trait PaperSearch: Send + Sync {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<Paper>>;
}

#[async_trait]
impl PaperSearch for ArxivClient {
    async fn search(&self, query: &str, max_results: usize) -> anyhow::Result<Vec<Paper>> {
        let cards = ArxivClient::search(self, query, max_results).await?;
        Ok(cards.into_iter().map(|c| c.into_paper()).collect())
    }
}

/// Search stage. Any backend failure is logged and yields no papers.
pub async fn run(search: &dyn PaperSearch, query: &str, max_results: usize, log: &RunLog) -> Vec<Paper> {
    log.info(format!("ResearchAgent searching arXiv for query: {}", query));
    match search.search(query, max_results).await {
        Ok(mut papers) => {
            papers.truncate(max_results);
            log.info(format!("ResearchAgent found {} papers", papers.len()));
            papers
        }
        Err(e) => {
            log.error(format!("ResearchAgent failed: {:#}", e));
            vec![]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::SessionId;

    struct Fixed(usize);

    #[async_trait]
    impl PaperSearch for Fixed {
        async fn search(&self, _q: &str, _n: usize) -> anyhow::Result<Vec<Paper>> {
            Ok((0..self.0)
                .map(|i| Paper { title: format!("t{i}"), authors: "a".into(), abstract_text: "x".into(), url: format!("u{i}") })
                .collect())
        }
    }

    struct Down;

    #[async_trait]
    impl PaperSearch for Down {
        async fn search(&self, _q: &str, _n: usize) -> anyhow::Result<Vec<Paper>> {
            anyhow::bail!("connection refused")
        }
    }

    fn log(dir: &tempfile::TempDir) -> RunLog {
        RunLog::create(&dir.path().join("r.log"), SessionId::parse("r").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn outage_becomes_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let l = log(&dir);
        assert!(run(&Down, "graphs", 5, &l).await.is_empty());
        let text = std::fs::read_to_string(dir.path().join("r.log")).unwrap();
        assert!(text.contains("ERROR ResearchAgent failed: connection refused"));
    }

    #[tokio::test]
    async fn results_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let l = log(&dir);
        let papers = run(&Fixed(9), "graphs", 3, &l).await;
        assert_eq!(papers.iter().map(|p| p.title.as_str()).collect::<Vec<_>>(), vec!["t0", "t1", "t2"]);
    }

    #[tokio::test]
    async fn unreachable_arxiv_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let l = log(&dir);
        let client = ArxivClient::new("http://127.0.0.1:9/api/query", None).unwrap();
        assert!(run(&client, "graphs", 5, &l).await.is_empty());
    }
}
