//! `-filter_complex` construction.

use dolly_project_model::CursorKeyframe;

/// Label of the composited video stream.
pub const VIDEO_OUT: &str = "[vout]";
/// Label of the mixed click-audio stream.
pub const AUDIO_OUT: &str = "[aout]";

/// An ordered list of filter chains, rendered joined by `;`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterGraph {
    chains: Vec<String>,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chain: impl Into<String>) {
        self.chains.push(chain.into());
    }

    pub fn extend(&mut self, chains: impl IntoIterator<Item = String>) {
        self.chains.extend(chains);
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn render(&self) -> String {
        self.chains.join(";")
    }
}

/// Video chain that forwards the raw capture unchanged.
pub fn passthrough_video() -> String {
    format!("[0:v]null{VIDEO_OUT}")
}

/// Click-sound chains: one delayed copy of the sound per click, mixed,
/// scaled by `volume`, then padded and trimmed to the video duration.
///
/// Returns no chains when there are no clicks.
pub fn build_click_audio_filters(
    clicks: &[&CursorKeyframe],
    audio_input: usize,
    volume: f64,
    duration_secs: f64,
) -> Vec<String> {
    let n = clicks.len();
    if n == 0 {
        return Vec::new();
    }

    let input = format!("[{audio_input}:a]");
    let tail = format!(
        "volume={volume},apad=whole_dur={duration_secs:.4},atrim=end={duration_secs:.4}{AUDIO_OUT}"
    );
    let delay = |kf: &CursorKeyframe| {
        let ms = kf.timestamp_ms.max(0.0).round() as u64;
        format!("adelay={ms}|{ms}")
    };

    if n == 1 {
        return vec![
            format!("{input}{}[d0]", delay(clicks[0])),
            format!("[d0]{tail}"),
        ];
    }

    let mut chains = Vec::with_capacity(n + 3);
    let split_outputs: String = (0..n).map(|i| format!("[c{i}]")).collect();
    chains.push(format!("{input}asplit={n}{split_outputs}"));
    for (i, kf) in clicks.iter().enumerate() {
        chains.push(format!("[c{i}]{}[d{i}]", delay(kf)));
    }
    let delayed: String = (0..n).map(|i| format!("[d{i}]")).collect();
    chains.push(format!("{delayed}amix=inputs={n}:normalize=0[clicks]"));
    chains.push(format!("[clicks]{tail}"));
    chains
}

#[cfg(test)]
mod tests {
    use super::*;
    use dolly_project_model::KeyframeKind;

    fn click(t: f64) -> CursorKeyframe {
        CursorKeyframe::new(KeyframeKind::Click, 0.0, 0.0, t, "a", 0)
    }

    #[test]
    fn test_no_clicks_no_audio() {
        assert!(build_click_audio_filters(&[], 2, 0.5, 3.0).is_empty());
    }

    #[test]
    fn test_single_click_topology() {
        let kf = click(1500.4);
        let chains = build_click_audio_filters(&[&kf], 2, 0.5, 4.0);
        assert_eq!(
            chains,
            vec![
                "[2:a]adelay=1500|1500[d0]",
                "[d0]volume=0.5,apad=whole_dur=4.0000,atrim=end=4.0000[aout]",
            ]
        );
    }

    #[test]
    fn test_multi_click_topology() {
        let kfs = [click(900.0), click(2000.0), click(3400.0)];
        let refs: Vec<_> = kfs.iter().collect();
        let graph = build_click_audio_filters(&refs, 1, 0.4, 4.0).join(";");
        assert_eq!(
            graph,
            "[1:a]asplit=3[c0][c1][c2];\
             [c0]adelay=900|900[d0];[c1]adelay=2000|2000[d1];[c2]adelay=3400|3400[d2];\
             [d0][d1][d2]amix=inputs=3:normalize=0[clicks];\
             [clicks]volume=0.4,apad=whole_dur=4.0000,atrim=end=4.0000[aout]"
        );
    }

    #[test]
    fn test_graph_render_joins_chains() {
        let mut graph = FilterGraph::new();
        assert!(graph.is_empty());
        graph.push(passthrough_video());
        graph.extend(vec!["[1:a]anull[aout]".to_string()]);
        assert_eq!(graph.render(), "[0:v]null[vout];[1:a]anull[aout]");
        assert_eq!(graph.chains().len(), 2);
    }
}
