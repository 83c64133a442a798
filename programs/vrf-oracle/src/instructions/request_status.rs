use anchor_lang::prelude::*;

use crate::state::{RandomnessRequest, RequestState};

/// Accounts required to read a request's status.
#[derive(Accounts)]
#[instruction(request_id: u64)]
pub struct GetRequestStatus<'info> {
    /// CHECK: Address is pinned by the seeds; may not exist yet.
    #[account(
        seeds = [b"request", request_id.to_le_bytes().as_ref()],
        bump,
    )]
    pub request: UncheckedAccount<'info>,
}

/// Report `Pending`, `Fulfilled` or `NotFound` through return data.
pub fn handler(ctx: Context<GetRequestStatus>, _request_id: u64) -> Result<RequestState> {
    let request_info = ctx.accounts.request.to_account_info();
    if request_info.owner != &crate::ID || request_info.data_is_empty() {
        return Ok(RequestState::NotFound);
    }
    let data = request_info.try_borrow_data()?;
    let request = RandomnessRequest::try_deserialize(&mut &data[..])?;
    Ok(RequestState::from_status(request.status))
}
