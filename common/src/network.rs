use anyhow::bail;
use chrono::NaiveDate;
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::{
    BetStatus, BookError, HistorySummary, LegId, NewLeg, Settlement, Wager, WagerId,
};

#[derive(Deserialize, Serialize, Debug, PartialEq, Eq, Clone)]
pub enum Request {
    Balance,
    Deposit { amount: Decimal },
    ListWagers { placed_on: Option<NaiveDate> },
    GetWager { wager_id: WagerId },
    CreateWager {
        title: String,
        placed_on: Option<NaiveDate>,
        stake: Option<Decimal>,
    }, // WagerCreated response
    RenameWager { wager_id: WagerId, title: String },
    AddLeg { wager_id: WagerId, leg: NewLeg }, // LegAdded response
    EditLeg {
        wager_id: WagerId,
        leg_id: LegId,
        title: String,
        sport: Option<String>,
    },
    RemoveLeg { wager_id: WagerId, leg_id: LegId },
    SetLegStatus {
        wager_id: WagerId,
        leg_id: LegId,
        status: BetStatus,
    },
    SetLegOdds {
        wager_id: WagerId,
        leg_id: LegId,
        odds: Decimal,
    },
    SetStake { wager_id: WagerId, stake: Decimal }, // Balance response
    Settle { wager_id: WagerId },
    DeleteWager { wager_id: WagerId }, // Balance response
    History {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Response {
    None,
    Balance(Decimal),
    Wager(Wager),
    Wagers(Vec<Wager>),
    WagerCreated(WagerId),
    LegAdded(LegId),
    Settled(Settlement),
    History(HistorySummary),
    Rejected(BookError),
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone)]
pub enum Packet {
    RequestPacket(Request),
    ResponsePacket(Response),
    Error,
}

/// A packet stream over a binary WebSocket, one MessagePack packet per frame.
pub struct Connection<S = TcpStream> {
    socket: WebSocketStream<S>,
}

impl Connection<TcpStream> {
    pub async fn from_tcp_stream(connection: TcpStream) -> anyhow::Result<Self> {
        let socket = tokio_tungstenite::accept_async(connection).await?;
        Ok(Self { socket })
    }
}

impl Connection<MaybeTlsStream<TcpStream>> {
    pub async fn connect(address: &str) -> anyhow::Result<Self> {
        let (socket, _) = tokio_tungstenite::connect_async(address).await?;
        Ok(Self { socket })
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Reads the next packet, or `None` once the peer has closed the socket.
    pub async fn read(&mut self) -> anyhow::Result<Option<Packet>> {
        loop {
            let Some(message) = self.socket.next().await else {
                return Ok(None);
            };
            match message? {
                Message::Binary(data) => return Ok(Some(rmp_serde::from_slice(&data)?)),
                Message::Close(_) => return Ok(None),
                Message::Ping(_) | Message::Pong(_) => continue,
                other => bail!("incorrect data type received: {:?}", other),
            }
        }
    }

    pub async fn send(&mut self, data: Packet) -> anyhow::Result<()> {
        let buf = rmp_serde::to_vec(&data)?;
        Ok(self.socket.send(Message::Binary(buf)).await?)
    }

    /// Sends a request and waits for the matching response.
    pub async fn call(&mut self, request: Request) -> anyhow::Result<Response> {
        self.send(Packet::RequestPacket(request)).await?;
        match self.read().await? {
            Some(Packet::ResponsePacket(response)) => Ok(response),
            Some(Packet::Error) => bail!("server reported an error"),
            Some(other) => bail!("incorrect packet type: {:?}", other),
            None => bail!("connection closed"),
        }
    }

    pub async fn close(&mut self) -> anyhow::Result<()> {
        Ok(self.socket.close(None).await?)
    }
}
