use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, oneshot};
use tower::Service;
use tracing::debug;

use crate::archive::ExportData;
use crate::controller::{Command, Envelope, Response};
use crate::error::ScraperError;
use crate::types::{LoaderEvent, LoadingState, Post};

/// tower::Serviceを実装したコントローラー操作用ハンドル
///
/// コマンドはコントローラーのキューに積まれ、処理後に応答が返る。
#[derive(Debug, Clone)]
pub struct LoaderService {
    commands: mpsc::Sender<Envelope>,
    events: broadcast::Sender<LoaderEvent>,
}

impl LoaderService {
    pub(crate) fn new(
        commands: mpsc::Sender<Envelope>,
        events: broadcast::Sender<LoaderEvent>,
    ) -> Self {
        Self { commands, events }
    }

    /// イベントの購読
    pub fn subscribe(&self) -> broadcast::Receiver<LoaderEvent> {
        self.events.subscribe()
    }

    /// コマンドを送信して応答を待つ
    pub async fn send(&self, command: Command) -> Result<Response, ScraperError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| ScraperError::Transport("コントローラーが起動していません".into()))?;

        response
            .await
            .map_err(|_| ScraperError::Transport("コントローラーから応答がありません".into()))?
    }

    pub async fn start(&self) -> Result<(), ScraperError> {
        self.send(Command::Start).await.map(|_| ())
    }

    pub async fn stop(&self) -> Result<(), ScraperError> {
        self.send(Command::Stop).await.map(|_| ())
    }

    pub async fn resume(&self) -> Result<(), ScraperError> {
        self.send(Command::Resume).await.map(|_| ())
    }

    /// 収集済みポストをすべて削除
    pub async fn reset(&self) -> Result<(), ScraperError> {
        self.send(Command::Reset).await.map(|_| ())
    }

    pub async fn ping(&self) -> Result<bool, ScraperError> {
        match self.send(Command::Ping).await? {
            Response::Ready => Ok(true),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_posts(&self) -> Result<Vec<Post>, ScraperError> {
        match self.send(Command::GetPosts).await? {
            Response::Posts(posts) => Ok(posts),
            other => Err(unexpected(other)),
        }
    }

    pub async fn get_state(&self) -> Result<LoadingState, ScraperError> {
        match self.send(Command::GetState).await? {
            Response::State(state) => Ok(state),
            other => Err(unexpected(other)),
        }
    }

    pub async fn export(&self) -> Result<ExportData, ScraperError> {
        match self.send(Command::Export).await? {
            Response::Export(data) => Ok(data),
            other => Err(unexpected(other)),
        }
    }

    /// インポートして (追加件数, 総件数) を返す
    pub async fn import(&self, data: Value) -> Result<(usize, usize), ScraperError> {
        match self.send(Command::Import(data)).await? {
            Response::Imported { added, total } => Ok((added, total)),
            other => Err(unexpected(other)),
        }
    }
}

fn unexpected(response: Response) -> ScraperError {
    debug!("Unexpected response: {:?}", response);
    ScraperError::Transport("想定外の応答です".into())
}

impl Service<Command> for LoaderService {
    type Response = Response;
    type Error = ScraperError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if self.commands.is_closed() {
            return Poll::Ready(Err(ScraperError::Transport(
                "コントローラーが起動していません".into(),
            )));
        }
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, command: Command) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { service.send(command).await })
    }
}
