use crate::config::settings::AppConfig;
use crate::infrastructure::queue::rabbitmq::RabbitMqService;
use crate::modules::transcode::service::TranscodeService;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub queue: RabbitMqService,
    pub transcode: TranscodeService,
}

impl AppState {
    pub fn new(config: AppConfig, queue: RabbitMqService, transcode: TranscodeService) -> Self {
        Self {
            config,
            queue,
            transcode,
        }
    }
}
