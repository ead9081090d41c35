use grain_analysis::AnalysisParams;

#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub(crate) params: AnalysisParams,
    pub(crate) max_upload_bytes: usize,
}
