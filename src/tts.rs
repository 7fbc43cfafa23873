use anyhow::Result;
use azure_speech::{synthesizer, Auth, stream::StreamExt};
use std::path::Path;
use tracing::{debug, info};

use crate::config::TtsConfig;

/// Azure text-to-speech, used to read model answers aloud.
pub struct AzureTts {
    subscription_key: String,
    region: String,
}

impl AzureTts {
    pub fn from_config(config: &TtsConfig) -> Result<Self> {
        if config.azure_speech_key.trim().is_empty() {
            anyhow::bail!("tts.azure_speech_key is not configured");
        }
        Ok(Self {
            subscription_key: config.azure_speech_key.clone(),
            region: config.azure_speech_region.clone(),
        })
    }

    /// Synthesizes `text` and returns the raw audio bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            anyhow::bail!("nothing to synthesize: text is empty");
        }

        let auth = Auth::from_subscription(self.region.clone(), self.subscription_key.clone());

        let config = synthesizer::Config::new()
            .with_language(synthesizer::Language::EnUs)
            .with_voice(synthesizer::Voice::EnUsJennyNeural);

        let client = synthesizer::Client::connect(auth, config).await?;
        let mut stream = client.synthesize(text).await?;

        let mut audio_data = Vec::new();
        while let Some(event_result) = stream.next().await {
            match event_result {
                Ok(synthesizer::Event::Synthesising(_, audio_chunk)) => {
                    audio_data.extend_from_slice(&audio_chunk);
                }
                Ok(synthesizer::Event::Synthesised(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(anyhow::anyhow!("speech synthesis failed: {}", e));
                }
            }
        }

        if audio_data.is_empty() {
            anyhow::bail!("no audio data received");
        }

        debug!("received {} bytes of audio", audio_data.len());
        Ok(audio_data)
    }

    /// Synthesizes `text` into `output_file`, creating parent directories.
    pub async fn synthesize_to_file(&self, text: &str, output_file: &Path) -> Result<()> {
        let audio_data = self.synthesize(text).await?;
        save_audio_file(&audio_data, output_file)?;
        info!("audio written to {}", output_file.display());
        Ok(())
    }
}

fn save_audio_file(audio_data: &[u8], output_file: &Path) -> Result<()> {
    if let Some(parent) = output_file.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("cannot create directory {}: {}", parent.display(), e))?;
    }

    std::fs::write(output_file, audio_data)
        .map_err(|e| anyhow::anyhow!("cannot write audio file {}: {}", output_file.display(), e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_rejected() {
        assert!(AzureTts::from_config(&TtsConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_empty_text_rejected_before_connecting() {
        let tts = AzureTts::from_config(&TtsConfig {
            azure_speech_key: "key".to_string(),
            azure_speech_region: "eastus".to_string(),
        })
        .unwrap();
        assert!(tts.synthesize("   ").await.is_err());
    }

    #[test]
    fn test_save_audio_creates_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio").join("sample.wav");
        save_audio_file(b"RIFF", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"RIFF");
    }
}
