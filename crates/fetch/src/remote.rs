use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use inkvault_source::Endpoints;
use inkvault_source::models::{CatalogEntry, Episode, EpisodeData, Provider, SeriesAssets, SeriesInfo};
use tokio::time::Instant;
use tracing::{debug, info, instrument};

use crate::client::HttpClient;
use crate::convert::{DEFAULT_QUALITY, convert, convert_all};
use crate::error::Result;
use crate::progress::{EpisodeProgress, ProgressSink, Ticker};
use crate::providers::{Canvas, Session, SourceProvider, Webtoons, random_delay};
use crate::retry::RetryPolicy;

/// Pacing and encoding knobs for [`HttpRemote`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Pause after each episode image, in milliseconds.
    pub jitter_ms: RangeInclusive<u64>,
    pub webp_quality: f32,
    /// Also list canvas (community) series.
    pub canvas: bool,
    pub canvas_max_pages: Option<u32>,
    /// Pause between canvas page batches, in milliseconds.
    pub canvas_pause_ms: RangeInclusive<u64>,
}
impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            jitter_ms: 50..=200,
            webp_quality: DEFAULT_QUALITY,
            canvas: false,
            canvas_max_pages: None,
            canvas_pause_ms: 2300..=2700,
        }
    }
}

/// Everything the rest of the system reads from the remote source.
///
/// Discovery and the download orchestrator only talk to this trait, so
/// their tests can swap the network for an in-memory fake.
#[async_trait]
pub trait Remote: Send + Sync {
    /// All series of one language, across every provider. May contain the
    /// same series more than once (once per genre it appears under).
    async fn listing(&self, language: &str) -> Result<Vec<CatalogEntry>>;

    async fn series_info(&self, entry: &CatalogEntry) -> Result<SeriesInfo>;

    /// Episodes in ascending number order.
    async fn episodes(&self, entry: &CatalogEntry) -> Result<Vec<Episode>>;

    /// Page image URLs of one episode in reading order.
    async fn image_links(&self, entry: &CatalogEntry, episode: &Episode) -> Result<Vec<String>>;

    /// Thumbnail and banners of a series, converted. Absent banners stay absent.
    async fn series_assets(&self, info: &SeriesInfo) -> Result<SeriesAssets>;

    /// Thumbnail and pages of one episode, converted.
    ///
    /// Pages are downloaded one at a time with a random pause in between.
    /// `progress` hears about it every second and once more at the end.
    async fn episode_data(&self, episode: &Episode, links: &[String], progress: ProgressSink) -> Result<EpisodeData>;
}

/// [`Remote`] over HTTP, dispatching on each entry's provider.
pub struct HttpRemote {
    session: Session,
    webtoons: Webtoons,
    canvas: Canvas,
}

impl HttpRemote {
    pub fn new(http: HttpClient, endpoints: Endpoints, retry: RetryPolicy, options: FetchOptions) -> Self {
        Self {
            session: Session {
                http,
                endpoints,
                retry,
                options,
            },
            webtoons: Webtoons,
            canvas: Canvas,
        }
    }

    fn provider(&self, provider: Provider) -> &dyn SourceProvider {
        match provider {
            Provider::Webtoons => &self.webtoons,
            Provider::Canvas => &self.canvas,
        }
    }

    async fn download(&self, url: &str, referer: Option<&str>) -> Result<Vec<u8>> {
        self.session.retry.run("image download", || self.session.http.image(url, referer)).await
    }

    async fn download_optional(&self, url: Option<&str>) -> Result<Option<Vec<u8>>> {
        match url {
            Some(url) => Ok(Some(self.download(url, None).await?)),
            None => Ok(None),
        }
    }

    async fn convert_optional(&self, data: Option<Vec<u8>>) -> Result<Option<Vec<u8>>> {
        match data {
            Some(data) => Ok(Some(convert(data, self.session.options.webp_quality).await?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl Remote for HttpRemote {
    #[instrument(skip(self))]
    async fn listing(&self, language: &str) -> Result<Vec<CatalogEntry>> {
        let mut entries = self.webtoons.listing(&self.session, language).await?;
        if self.session.options.canvas {
            entries.extend(self.canvas.listing(&self.session, language).await?);
        }
        info!(count = entries.len(), "Listed series");
        Ok(entries)
    }

    async fn series_info(&self, entry: &CatalogEntry) -> Result<SeriesInfo> {
        self.provider(entry.provider).series_info(&self.session, entry).await
    }

    async fn episodes(&self, entry: &CatalogEntry) -> Result<Vec<Episode>> {
        self.provider(entry.provider).episodes(&self.session, entry).await
    }

    async fn image_links(&self, entry: &CatalogEntry, episode: &Episode) -> Result<Vec<String>> {
        self.provider(entry.provider).image_links(&self.session, entry, episode).await
    }

    #[instrument(skip_all, fields(title = %info.entry.title))]
    async fn series_assets(&self, info: &SeriesInfo) -> Result<SeriesAssets> {
        let (thumbnail, top_banner, background_banner, mobile_banner) = futures::try_join!(
            self.download(&info.entry.thumbnail, None),
            self.download(&info.banners.top, None),
            self.download_optional(info.banners.background.as_deref()),
            self.download_optional(info.banners.mobile.as_deref()),
        )?;
        let quality = self.session.options.webp_quality;
        let (thumbnail, top_banner, background_banner, mobile_banner) = futures::try_join!(
            convert(thumbnail, quality),
            convert(top_banner, quality),
            self.convert_optional(background_banner),
            self.convert_optional(mobile_banner),
        )?;
        Ok(SeriesAssets {
            thumbnail,
            background_banner,
            top_banner,
            mobile_banner,
        })
    }

    #[instrument(skip_all, fields(number = episode.number, pages = links.len()))]
    async fn episode_data(&self, episode: &Episode, links: &[String], progress: ProgressSink) -> Result<EpisodeData> {
        let started = Instant::now();
        let thumbnail = self.download(&episode.thumbnail, None).await?;

        let downloaded = Arc::new(AtomicUsize::new(0));
        let ticker = Ticker::start(downloaded.clone(), links.len(), progress.clone());
        let mut images = Vec::with_capacity(links.len());
        for link in links {
            images.push(self.download(link, Some(&episode.link)).await?);
            downloaded.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(random_delay(&self.session.options.jitter_ms)).await;
        }
        drop(ticker);
        let done = EpisodeProgress {
            downloaded: images.len(),
            total: links.len(),
            elapsed: started.elapsed(),
        };
        debug!(elapsed = ?done.elapsed, rate = format!("{:.2}", done.rate()), "Downloaded episode");
        progress(done);

        let quality = self.session.options.webp_quality;
        let (thumbnail, images) = futures::try_join!(convert(thumbnail, quality), convert_all(images, quality))?;
        Ok(EpisodeData { thumbnail, images })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClientOptions;
    use crate::convert::tests::png;
    use crate::error::ErrorKind;
    use std::sync::Mutex;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote(server: &MockServer, options: FetchOptions) -> HttpRemote {
        HttpRemote::new(
            HttpClient::new(&ClientOptions::default()).unwrap(),
            Endpoints::single(server.uri()),
            RetryPolicy::bounded(3, Duration::ZERO),
            FetchOptions {
                jitter_ms: 0..=0,
                canvas_pause_ms: 0..=0,
                ..options
            },
        )
    }

    fn entry(server: &MockServer, provider: Provider) -> CatalogEntry {
        CatalogEntry {
            title: "Tower of God".to_string(),
            author: "SIU".to_string(),
            link: format!("{}/en/fantasy/tower-of-god/list?title_no=95", server.uri()),
            thumbnail: format!("{}/img/thumb.png", server.uri()),
            stars: "1,2M".parse().unwrap(),
            genres: vec!["fantasy".to_string()],
            id: "95".to_string(),
            language: "en".to_string(),
            provider,
        }
    }

    async fn html(server: &MockServer, at: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    async fn empty_pages(server: &MockServer) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .with_priority(10)
            .mount(server)
            .await;
    }

    async fn image(server: &MockServer, at: &str, seed: u8) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(png(seed)))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_webtoons_listing() {
        let server = MockServer::start().await;
        let desktop = format!(
            r#"<ul class="webtoon_list"><li><a href="{}/en/fantasy/tower-of-god/list?title_no=95">
                <img src="https://cdn.example.com/desktop.jpg">
                <div class="info_text"><strong class="title">Tower of God</strong>
                <div class="author">SIU</div><div class="view_count">1,2M</div></div></a></li></ul>"#,
            server.uri()
        );
        let mobile = r#"<ul class="genre_FANTASY_list"><li><a href="/x">
            <div class="pic"><img src="https://cdn.example.com/mobile.jpg"></div>
            <div class="info"><p class="subj"><span>Tower of God</span></p></div></a></li></ul>"#;
        html(&server, "/en/genres/fantasy", desktop).await;
        html(&server, "/m/en/genres/fantasy", mobile.to_string()).await;
        empty_pages(&server).await;

        let entries = remote(&server, FetchOptions::default()).listing("en").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].title, "Tower of God");
        assert_eq!(entries[0].thumbnail, "https://cdn.example.com/mobile.jpg");
        assert_eq!(entries[0].provider, Provider::Webtoons);
    }

    #[tokio::test]
    async fn test_genre_is_retried_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/genres/drama"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        let desktop = r#"<ul class="webtoon_list"><li><a href="https://www.webtoons.com/en/drama/x/list?title_no=1">
            <img src="https://cdn.example.com/x.jpg"><div class="info_text"><strong class="title">X</strong>
            <div class="author">A</div><div class="view_count">5</div></div></a></li></ul>"#;
        html(&server, "/en/genres/drama", desktop.to_string()).await;
        empty_pages(&server).await;

        let entries = remote(&server, FetchOptions::default()).listing("en").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].genres, ["drama"]);
    }

    #[tokio::test]
    async fn test_broken_card_fails_listing() {
        let server = MockServer::start().await;
        html(&server, "/en/genres/action", r#"<ul class="webtoon_list"><li><a href="/x"></a></li></ul>"#.to_string())
            .await;
        empty_pages(&server).await;
        let err = remote(&server, FetchOptions::default()).listing("en").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse));
    }

    #[tokio::test]
    async fn test_canvas_listing_retries_failed_batch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/canvas/list"))
            .and(query_param("genreTab", "COMEDY"))
            .and(query_param("page", "999999999"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="paginate"><a><span>1</span></a><a><span>2</span></a><a><span>3</span></a></div>"#,
            ))
            .mount(&server)
            .await;
        for page in 1..=3 {
            Mock::given(method("GET"))
                .and(path("/en/canvas/list"))
                .and(query_param("genreTab", "COMEDY"))
                .and(query_param("page", page.to_string()))
                .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                    r#"<div class="challenge_lst"><ul><li><a href="https://www.webtoons.com/en/canvas/c{page}/list?title_no={page}">
                        <span><img src="https://cdn.example.com/{page}.jpg"></span>
                        <p class="subj">Comic {page}</p><p class="author">Someone</p>
                        <p class="grade_area"><em>1</em></p></a></li></ul></div>"#
                )))
                .mount(&server)
                .await;
        }
        // The second page fails once; the whole batch is retried.
        Mock::given(method("GET"))
            .and(path("/en/canvas/list"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        empty_pages(&server).await;

        let options = FetchOptions {
            canvas: true,
            canvas_max_pages: Some(2),
            ..FetchOptions::default()
        };
        let entries = remote(&server, options).listing("en").await.unwrap();
        let titles: Vec<_> = entries.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Comic 1", "Comic 2"]);
        assert!(entries.iter().all(|e| e.provider == Provider::Canvas));
    }

    #[tokio::test]
    async fn test_series_info() {
        let server = MockServer::start().await;
        html(
            &server,
            "/en/fantasy/tower-of-god/list",
            r#"<div class="detail_bg" style="background:url('https://cdn.example.com/bg.jpg')"></div>
            <span class="thmb"><img src="https://cdn.example.com/top.png"></span>
            <ul id="_listUl"><li><a href="/e/3"><span class="tx">#3</span></a></li></ul>"#
                .to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/m/en/fantasy/tower-of-god/list"))
            .and(query_param("webtoon-platform-redirect", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;
        let info = remote(&server, FetchOptions::default())
            .series_info(&entry(&server, Provider::Webtoons))
            .await
            .unwrap();
        assert_eq!(info.episode_count, 3);
        assert_eq!(info.banners.top, "https://cdn.example.com/top.png");
        assert_eq!(info.banners.mobile, None);
    }

    #[tokio::test]
    async fn test_episodes_skip_missing_viewers() {
        let server = MockServer::start().await;
        let viewer = "/en/fantasy/tower-of-god/x/viewer";
        Mock::given(method("GET"))
            .and(path(viewer))
            .and(query_param("episode_no", "1"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(viewer))
            .and(query_param("episode_no", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<div class="episode_cont"><ul>
                    <li><a href="https://www.webtoons.com/e2"><span class="thmb"><img data-url="https://cdn.example.com/2.jpg"></span><span class="subj">Two</span></a></li>
                    <li><a href="https://www.webtoons.com/e3"><span class="thmb"><img data-url="https://cdn.example.com/3.jpg"></span><span class="subj">Three</span></a></li>
                </ul></div>"#,
            ))
            .mount(&server)
            .await;
        // Same pages for both providers.
        for provider in [Provider::Webtoons, Provider::Canvas] {
            let episodes = remote(&server, FetchOptions::default())
                .episodes(&entry(&server, provider))
                .await
                .unwrap();
            let numbers: Vec<_> = episodes.iter().map(|e| e.number).collect();
            assert_eq!(numbers, [2, 3]);
            assert_eq!(episodes[1].title, "Three");
        }
    }

    #[tokio::test]
    async fn test_episodes_give_up_with_bounded_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)).mount(&server).await;
        let err = remote(&server, FetchOptions::default())
            .episodes(&entry(&server, Provider::Webtoons))
            .await
            .unwrap_err();
        assert!(matches!(&*err, ErrorKind::Exhausted(3)));
    }

    #[tokio::test]
    async fn test_image_links() {
        let server = MockServer::start().await;
        html(
            &server,
            "/en/fantasy/tower-of-god/episode-7/viewer",
            r#"<div id="_imageList"><img data-url="https://cdn.example.com/1.jpg"><img data-url="https://cdn.example.com/2.jpg"></div>"#
                .to_string(),
        )
        .await;
        let episode = Episode {
            title: "Seven".to_string(),
            number: 7,
            link: String::new(),
            thumbnail: String::new(),
        };
        let links = remote(&server, FetchOptions::default())
            .image_links(&entry(&server, Provider::Webtoons), &episode)
            .await
            .unwrap();
        assert_eq!(links, ["https://cdn.example.com/1.jpg", "https://cdn.example.com/2.jpg"]);
    }

    #[tokio::test]
    async fn test_series_assets_without_optional_banners() {
        let server = MockServer::start().await;
        image(&server, "/img/thumb.png", 1).await;
        image(&server, "/img/top.png", 2).await;
        let info = SeriesInfo {
            entry: entry(&server, Provider::Webtoons),
            episode_count: 1,
            banners: inkvault_source::models::Banners {
                background: None,
                top: format!("{}/img/top.png", server.uri()),
                mobile: None,
            },
        };
        let assets = remote(&server, FetchOptions::default()).series_assets(&info).await.unwrap();
        assert_eq!(&assets.thumbnail[0..4], b"RIFF");
        assert_eq!(&assets.top_banner[0..4], b"RIFF");
        assert_eq!(assets.background_banner, None);
        assert_eq!(assets.mobile_banner, None);
    }

    #[tokio::test]
    async fn test_episode_data() {
        let server = MockServer::start().await;
        image(&server, "/img/ep-thumb.png", 9).await;
        let episode_link = format!("{}/en/fantasy/tower-of-god/episode-1/viewer", server.uri());
        for i in 0..3u8 {
            Mock::given(method("GET"))
                .and(path(format!("/img/{i}.png")))
                .and(header("referer", episode_link.as_str()))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(png(i)))
                .expect(1)
                .mount(&server)
                .await;
        }
        let episode = Episode {
            title: "One".to_string(),
            number: 1,
            link: episode_link.clone(),
            thumbnail: format!("{}/img/ep-thumb.png", server.uri()),
        };
        let links: Vec<_> = (0..3).map(|i| format!("{}/img/{i}.png", server.uri())).collect();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink: ProgressSink = {
            let seen = seen.clone();
            Arc::new(move |p: EpisodeProgress| seen.lock().unwrap().push(p.percent()))
        };

        let data = remote(&server, FetchOptions::default())
            .episode_data(&episode, &links, sink)
            .await
            .unwrap();
        assert_eq!(data.images.len(), 3);
        assert_eq!(data.images[2], crate::convert::to_webp(&png(2), DEFAULT_QUALITY).unwrap());
        assert_eq!(&data.thumbnail[0..4], b"RIFF");
        assert_eq!(seen.lock().unwrap().last(), Some(&100.0));
    }
}
