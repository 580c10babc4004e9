use common::network::{Connection, Packet, Request, Response};
use common::BookError;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::history::DateRange;
use crate::wager_manager::WagerHandle;

pub async fn hande_listen_server(listener: TcpListener, wagers: WagerHandle) -> anyhow::Result<()> {
    info!(address = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let wagers = wagers.clone();

        tokio::spawn(async move {
            match Connection::from_tcp_stream(stream).await {
                Ok(connection) => {
                    debug!(%peer, "client connected");
                    handle_connection(connection, wagers).await;
                    debug!(%peer, "client disconnected");
                }
                Err(e) => warn!(%peer, error = %e, "websocket handshake failed"),
            }
        });
    }
}

async fn handle_connection(mut connection: Connection, wagers: WagerHandle) {
    if let Err(e) = handle_client(&mut connection, &wagers).await {
        warn!(error = %e, "closing connection");
        connection.send(Packet::Error).await.ok();
    }
}

async fn handle_client(connection: &mut Connection, wagers: &WagerHandle) -> anyhow::Result<()> {
    while let Some(packet) = connection.read().await? {
        let Packet::RequestPacket(request) = packet else {
            anyhow::bail!("incorrect packet type: {:?}", packet);
        };
        let reply = match dispatch(request, wagers).await {
            Ok(response) => Packet::ResponsePacket(response),
            Err(error) => match error.downcast::<BookError>() {
                Ok(rejection) => {
                    debug!(reason = %rejection, "request rejected");
                    Packet::ResponsePacket(Response::Rejected(rejection))
                }
                Err(error) => {
                    warn!(error = %error, "request failed");
                    Packet::Error
                }
            },
        };
        connection.send(reply).await?;
    }
    Ok(()) // closed by the client
}

/// Maps one wire request onto the wager manager.
pub async fn dispatch(request: Request, wagers: &WagerHandle) -> anyhow::Result<Response> {
    let response = match request {
        Request::Balance => Response::Balance(wagers.balance().await?),
        Request::Deposit { amount } => Response::Balance(wagers.deposit(amount).await?),
        Request::ListWagers { placed_on } => Response::Wagers(wagers.list_wagers(placed_on).await?),
        Request::GetWager { wager_id } => Response::Wager(wagers.get_wager(wager_id).await?),
        Request::CreateWager {
            title,
            placed_on,
            stake,
        } => {
            let stake = stake.unwrap_or(Decimal::ZERO);
            Response::WagerCreated(wagers.create_wager(title, placed_on, stake).await?)
        }
        Request::RenameWager { wager_id, title } => {
            wagers.rename_wager(wager_id, title).await?;
            Response::None
        }
        Request::AddLeg { wager_id, leg } => {
            Response::LegAdded(wagers.add_leg(wager_id, leg).await?)
        }
        Request::EditLeg {
            wager_id,
            leg_id,
            title,
            sport,
        } => {
            wagers.edit_leg(wager_id, leg_id, title, sport).await?;
            Response::None
        }
        Request::RemoveLeg { wager_id, leg_id } => {
            wagers.remove_leg(wager_id, leg_id).await?;
            Response::None
        }
        Request::SetLegStatus {
            wager_id,
            leg_id,
            status,
        } => {
            wagers.set_leg_status(wager_id, leg_id, status).await?;
            Response::None
        }
        Request::SetLegOdds {
            wager_id,
            leg_id,
            odds,
        } => {
            wagers.set_leg_odds(wager_id, leg_id, odds).await?;
            Response::None
        }
        Request::SetStake { wager_id, stake } => {
            Response::Balance(wagers.set_stake(wager_id, stake).await?)
        }
        Request::Settle { wager_id } => Response::Settled(wagers.settle(wager_id).await?),
        Request::DeleteWager { wager_id } => {
            Response::Balance(wagers.delete_wager(wager_id).await?)
        }
        Request::History { from, to } => {
            Response::History(wagers.history(DateRange::new(from, to)).await?)
        }
    };
    Ok(response)
}
