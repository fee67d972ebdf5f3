use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Poll interval while waiting on a tesseract child process.
const CHILD_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Longest stderr excerpt carried into an error message.
const MAX_STDERR_CHARS: usize = 300;

/// Run `job` on a worker thread and wait at most `timeout` for its result.
///
/// On expiry the worker is detached and left to finish on its own; its result
/// is discarded.
pub fn run_with_timeout<T, F>(timeout: Option<Duration>, job: F) -> Result<T, ExtractionError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, ExtractionError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("ocr-worker".into())
        .spawn(move || {
            // Receiver may be gone after a timeout.
            let _ = tx.send(job());
        })?;

    match timeout {
        Some(limit) => match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ExtractionError::OcrTimeout(limit)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ExtractionError::OcrEngine(
                "OCR worker exited without a result".into(),
            )),
        },
        None => rx.recv().map_err(|_| {
            ExtractionError::OcrEngine("OCR worker exited without a result".into())
        })?,
    }
}

/// Tesseract through its command-line binary.
///
/// The image is piped to `tesseract stdin stdout -l <lang>` so nothing touches
/// the disk. A child that outlives its deadline is killed.
pub struct TesseractCli {
    binary: PathBuf,
    default_lang: String,
}

impl TesseractCli {
    pub fn new(binary: impl Into<PathBuf>, lang: &str) -> Self {
        Self {
            binary: binary.into(),
            default_lang: lang.to_string(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run `tesseract --version` and return the first line of its banner.
    pub fn probe(&self) -> Result<String, ExtractionError> {
        let output = Command::new(&self.binary)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                ExtractionError::OcrInit(format!("cannot run {}: {e}", self.binary.display()))
            })?;

        if !output.status.success() {
            return Err(ExtractionError::OcrInit(format!(
                "{} --version exited with {}",
                self.binary.display(),
                output.status
            )));
        }

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            output.stderr
        } else {
            output.stdout
        };
        Ok(String::from_utf8_lossy(&banner)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_image(
        &self,
        image_bytes: &[u8],
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        self.ocr_image_with_lang(image_bytes, &self.default_lang, timeout)
    }

    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        let mut child = Command::new(&self.binary)
            .args(["stdin", "stdout", "-l", lang])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                ExtractionError::OcrInit(format!("cannot run {}: {e}", self.binary.display()))
            })?;

        // Feed stdin and drain both pipes on their own threads so a large
        // image or chatty stderr cannot deadlock the child.
        let writer = child.stdin.take().map(|mut stdin| {
            let bytes = image_bytes.to_vec();
            thread::spawn(move || {
                // Broken pipe here means tesseract exited early; its status says why.
                let _ = stdin.write_all(&bytes);
            })
        });
        let stdout_reader = child.stdout.take().map(drain);
        let stderr_reader = child.stderr.take().map(drain);

        let started = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    terminate(&mut child);
                    return Err(e.into());
                }
            }
            if let Some(limit) = timeout {
                if started.elapsed() >= limit {
                    terminate(&mut child);
                    tracing::warn!(timeout_secs = limit.as_secs(), "Tesseract OCR timed out");
                    return Err(ExtractionError::OcrTimeout(limit));
                }
            }
            thread::sleep(CHILD_POLL_INTERVAL);
        };

        if let Some(handle) = writer {
            let _ = handle.join();
        }
        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;

        if !status.success() {
            let message: String = String::from_utf8_lossy(&stderr)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
                .chars()
                .take(MAX_STDERR_CHARS)
                .collect();
            return Err(ExtractionError::OcrEngine(format!(
                "tesseract exited with {status}: {message}"
            )));
        }

        let text = String::from_utf8_lossy(&stdout).replace('\x0c', "");
        Ok(OcrPageResult {
            text,
            confidence: None,
        })
    }
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(
    handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<Vec<u8>, ExtractionError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| ExtractionError::OcrEngine("pipe reader panicked".into()))?
            .map_err(ExtractionError::from),
        None => Ok(Vec::new()),
    }
}

/// Kill and reap a tesseract child that will not be waited on normally.
fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "Failed to kill tesseract process");
    }
    let _ = child.wait();
}

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: PathBuf,
    default_lang: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory holding `<lang>.traineddata`.
    pub fn new(tessdata_dir: &Path, lang: &str) -> Result<Self, ExtractionError> {
        for code in lang.split('+') {
            let traineddata = tessdata_dir.join(format!("{code}.traineddata"));
            if !traineddata.exists() {
                return Err(ExtractionError::OcrInit(format!(
                    "missing {}",
                    traineddata.display()
                )));
            }
        }

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            default_lang: lang.to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn ocr_image(
        &self,
        image_bytes: &[u8],
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        self.ocr_image_with_lang(image_bytes, &self.default_lang, timeout)
    }

    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        let tessdata = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?
            .to_string();
        let lang = lang.to_string();
        let bytes = image_bytes.to_vec();

        // libtesseract cannot be interrupted; a timed-out worker runs to completion detached.
        run_with_timeout(timeout, move || {
            let tess = tesseract::Tesseract::new(Some(&tessdata), Some(&lang))
                .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

            let mut tess = tess
                .set_image_from_mem(&bytes)
                .map_err(|e| ExtractionError::OcrEngine(format!("{e:?}")))?;

            let text = tess
                .get_text()
                .map_err(|e| ExtractionError::OcrEngine(format!("{e:?}")))?;

            let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

            Ok(OcrPageResult {
                text,
                confidence: Some(confidence),
            })
        })
    }
}

/// Scripted outcome for one `MockOcrEngine` call.
#[derive(Debug, Clone)]
pub enum MockOcrOutcome {
    Text(String),
    EngineError(String),
    /// Behave as if the deadline expired (or hang without one).
    Timeout,
}

/// Mock OCR engine for unit testing without Tesseract.
///
/// Scripted outcomes are consumed one per call; once exhausted every call
/// returns `text` (after `delay`, bounded by the caller's timeout).
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    delay: Option<Duration>,
    failure: Option<String>,
    script: Mutex<VecDeque<MockOcrOutcome>>,
    calls: Mutex<Vec<MockOcrCall>>,
}

/// What the mock saw on one call.
#[derive(Debug, Clone, PartialEq)]
pub struct MockOcrCall {
    pub lang: String,
    pub timeout: Option<Duration>,
    pub bytes_len: usize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            delay: None,
            failure: None,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with an engine error.
    pub fn failing(message: &str) -> Self {
        let mut engine = Self::new("", 0.0);
        engine.failure = Some(message.to_string());
        engine
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_script(mut self, outcomes: Vec<MockOcrOutcome>) -> Self {
        if let Ok(script) = self.script.get_mut() {
            script.extend(outcomes);
        }
        self
    }

    pub fn calls(&self) -> Vec<MockOcrCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(
        &self,
        image_bytes: &[u8],
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        self.ocr_image_with_lang(image_bytes, "eng", timeout)
    }

    fn ocr_image_with_lang(
        &self,
        image_bytes: &[u8],
        lang: &str,
        timeout: Option<Duration>,
    ) -> Result<OcrPageResult, ExtractionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockOcrCall {
                lang: lang.to_string(),
                timeout,
                bytes_len: image_bytes.len(),
            });
        }

        let outcome = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match outcome {
            Some(MockOcrOutcome::Text(text)) => Ok(OcrPageResult {
                text,
                confidence: Some(self.confidence),
            }),
            Some(MockOcrOutcome::EngineError(message)) => Err(ExtractionError::OcrEngine(message)),
            Some(MockOcrOutcome::Timeout) => {
                Err(ExtractionError::OcrTimeout(timeout.unwrap_or(Duration::ZERO)))
            }
            None if self.failure.is_some() => Err(ExtractionError::OcrEngine(
                self.failure.clone().unwrap_or_default(),
            )),
            None => {
                let text = self.text.clone();
                let confidence = self.confidence;
                let delay = self.delay;
                run_with_timeout(timeout, move || {
                    if let Some(delay) = delay {
                        thread::sleep(delay);
                    }
                    Ok(OcrPageResult {
                        text,
                        confidence: Some(confidence),
                    })
                })
            }
        }
    }
}

/// OCR engine plus the language every call uses.
#[derive(Clone)]
pub struct OcrService {
    engine: Arc<dyn OcrEngine>,
    language: String,
}

impl OcrService {
    pub fn new(engine: Arc<dyn OcrEngine>, language: &str) -> Self {
        Self {
            engine,
            language: language.to_string(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Recognize text in an encoded image. Empty output is not an error.
    pub fn recognize(
        &self,
        image_bytes: &[u8],
        timeout: Option<Duration>,
    ) -> Result<String, ExtractionError> {
        let result = self
            .engine
            .ocr_image_with_lang(image_bytes, &self.language, timeout)?;
        tracing::debug!(
            chars = result.text.len(),
            confidence = ?result.confidence,
            "OCR complete"
        );
        Ok(result.text)
    }
}
