//! Contract bindings for the vault system.

use alloy::sol;

sol! {
    #[sol(rpc)]
    #[derive(Debug)]
    interface IERC20 {
        event Transfer(address indexed from, address indexed to, uint256 amount);

        function balanceOf(address owner) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    /// Per-deal vault holding escrowed funds.
    ///
    /// The release moves the recipient leg through the fee splitter, which
    /// divides it between the recipient and the platform fee recipient, and
    /// returns the refund leg to the payer directly.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IEscrowVault {
        event Released(address indexed recipient, uint256 recipientAmount, uint256 refundAmount);

        error AlreadyReleased();
        error InsufficientVaultBalance();

        function release(
            address recipient,
            uint256 recipientAmount,
            address payer,
            uint256 refundAmount
        ) external;
    }
}
