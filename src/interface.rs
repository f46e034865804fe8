//! High-level client over a [`Transport`]

use crate::address::{decode_ss58_for_format, encode_ss58, is_valid_ss58_address};
use crate::builder::{self, Call, CallParams};
use crate::codec::ScaleCodec;
use crate::config::InterfaceConfig;
use crate::error::{InterfaceError, Result};
use crate::extrinsic::{Extrinsic, ExtrinsicParams};
use crate::keypair::Keypair;
use crate::lifecycle::{fetch_receipt, request, wait_for_block, SubmitOptions};
use crate::metadata::{MetadataResolver, RuntimeMetadata};
use crate::receipt::ExtrinsicReceipt;
use crate::registry::{ReloadOptions, TypeRegistry};
use crate::transport::Transport;
use crate::types::{
    to_hex, AddressFormat, ChainProperties, Era, Hash, Material, Mortality, PaymentInfo,
    RuntimeVersion,
};
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

/// Per-extrinsic signing options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtrinsicOptions {
    /// Defaults to a mortal era of the configured period
    pub era: Option<Mortality>,
    /// Fetched from the chain when absent
    pub nonce: Option<u32>,
    pub tip: u128,
}

/// Client for one chain connection.
///
/// Metadata is fetched once per runtime version and its type table becomes
/// the registry's remote layer. Type overrides survive those reloads.
pub struct SubstrateInterface<T: Transport> {
    transport: T,
    config: InterfaceConfig,
    registry: TypeRegistry,
    resolver: MetadataResolver,
    /// Spec version whose types are in the registry's remote layer
    registry_version: Mutex<Option<u32>>,
    chain: OnceCell<String>,
    properties: OnceCell<ChainProperties>,
    genesis_hash: OnceCell<Hash>,
}

impl<T: Transport> SubstrateInterface<T> {
    pub fn new(transport: T, config: InterfaceConfig) -> Result<Self> {
        config.validate()?;
        let registry = TypeRegistry::new(&config.type_registry_preset, config.max_alias_hops)?;
        Ok(Self {
            transport,
            config,
            registry,
            resolver: MetadataResolver::new(),
            registry_version: Mutex::new(None),
            chain: OnceCell::new(),
            properties: OnceCell::new(),
            genesis_hash: OnceCell::new(),
        })
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &InterfaceConfig {
        &self.config
    }

    pub fn type_registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub async fn runtime_version(&self) -> Result<RuntimeVersion> {
        request(
            "runtime_version",
            self.config.request_timeout(),
            self.transport.runtime_version(),
        )
        .await
    }

    /// Metadata of the current runtime, fetched only when the version is new
    pub async fn metadata(&self) -> Result<Arc<RuntimeMetadata>> {
        let version = self.runtime_version().await?;
        self.metadata_for(version.spec_version).await
    }

    async fn metadata_for(&self, spec_version: u32) -> Result<Arc<RuntimeMetadata>> {
        let timeout = self.config.request_timeout();
        let metadata = self
            .resolver
            .metadata(spec_version, || {
                request("metadata", timeout, self.transport.metadata(spec_version))
            })
            .await?;
        self.sync_registry(spec_version, &metadata)?;
        Ok(metadata)
    }

    fn sync_registry(&self, spec_version: u32, metadata: &RuntimeMetadata) -> Result<()> {
        let mut loaded = self
            .registry_version
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if *loaded == Some(spec_version) {
            return Ok(());
        }
        self.registry
            .reload(Some(&metadata.types), ReloadOptions::default())?;
        *loaded = Some(spec_version);
        info!(spec_version, "Type registry loaded from runtime metadata");
        Ok(())
    }

    /// Rebuild the registry's remote layer from current metadata, or from the
    /// bundled preset when `options.use_remote_preset` is false.
    pub async fn reload_type_registry(&self, options: ReloadOptions) -> Result<()> {
        let version = self.runtime_version().await?;
        let metadata = if options.use_remote_preset {
            Some(
                self.resolver
                    .metadata(version.spec_version, || {
                        request(
                            "metadata",
                            self.config.request_timeout(),
                            self.transport.metadata(version.spec_version),
                        )
                    })
                    .await?,
            )
        } else {
            None
        };

        let mut loaded = self
            .registry_version
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        self.registry
            .reload(metadata.as_ref().map(|m| m.types.as_slice()), options)?;
        *loaded = Some(version.spec_version);
        Ok(())
    }

    /// Override `name` with the type described by `type_string`
    pub fn set_type_override(&self, name: &str, type_string: &str) -> Result<()> {
        self.registry.set_override_str(name, type_string)
    }

    pub fn clear_type_overrides(&self) {
        self.registry.clear_overrides();
    }

    /// Compose and validate a call. Nothing is sent.
    pub async fn compose_call(
        &self,
        module: &str,
        function: &str,
        params: &CallParams,
    ) -> Result<Call> {
        let metadata = self.metadata().await?;
        let spec = metadata.call_spec(module, function)?;
        let ss58_format = self.ss58_format().await?;
        let snapshot = self.registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, Some(ss58_format));
        builder::compose_call(&spec, params, &codec)
    }

    /// Fee and weight estimate for `call` signed by `signer`.
    ///
    /// Queries the fee of a zero-signature extrinsic of the same length.
    /// Nothing is broadcast and the keypair needs no private key.
    pub async fn get_payment_info(&self, call: &Call, signer: &Keypair) -> Result<PaymentInfo> {
        let nonce = self.account_nonce(signer).await?;
        let params = ExtrinsicParams {
            era: Era::mortal(self.config.era_period, 0),
            nonce,
            tip: 0,
            checkpoint: [0u8; 32],
        };
        let placeholder = Extrinsic::placeholder(call, signer, &params, self.config.address_type);
        request(
            "query_fee",
            self.config.request_timeout(),
            self.transport.query_fee(placeholder.as_bytes()),
        )
        .await
    }

    /// Sign `call` into a submittable extrinsic.
    ///
    /// Fails with `Signing` before any request if `keypair` cannot sign.
    pub async fn create_signed_extrinsic(
        &self,
        call: &Call,
        keypair: &Keypair,
        options: ExtrinsicOptions,
    ) -> Result<Extrinsic> {
        if !keypair.can_sign() {
            return Err(InterfaceError::Signing(
                "Keypair has no private key".to_string(),
            ));
        }

        let nonce = match options.nonce {
            Some(nonce) => nonce,
            None => self.account_nonce(keypair).await?,
        };
        let version = self.runtime_version().await?;
        let genesis_hash = self.genesis_hash().await?;

        let mortality = options.era.unwrap_or(Mortality::Mortal {
            period: self.config.era_period,
        });
        let (era, checkpoint) = match mortality {
            Mortality::Immortal => (Era::Immortal, genesis_hash),
            Mortality::Mortal { period } => {
                let head = request(
                    "chain_head",
                    self.config.request_timeout(),
                    self.transport.chain_head(),
                )
                .await?;
                let era = Era::mortal(period, head);
                let birth = era.birth(head);
                let checkpoint = request(
                    "block_hash",
                    self.config.request_timeout(),
                    self.transport.block_hash(birth),
                )
                .await?
                .ok_or_else(|| {
                    InterfaceError::Transport(format!("Era birth block {} not found", birth))
                })?;
                (era, checkpoint)
            }
        };

        let material = Material {
            genesis_hash,
            spec_version: version.spec_version,
            transaction_version: version.transaction_version,
        };
        let params = ExtrinsicParams {
            era,
            nonce,
            tip: options.tip,
            checkpoint,
        };
        let extrinsic =
            Extrinsic::sign(call, keypair, &params, &material, self.config.address_type)?;
        debug!(
            call = %format!("{}.{}", call.module(), call.function()),
            nonce,
            era = ?era,
            hash = %extrinsic.hash_hex(),
            "Signed extrinsic"
        );
        Ok(extrinsic)
    }

    /// Submit a signed extrinsic.
    ///
    /// Without wait flags the receipt is pending: only the hash is known.
    /// Otherwise this suspends until inclusion (or finalization) and the
    /// receipt carries the extrinsic's events and outcome. A failed dispatch
    /// is an `Ok` receipt with `is_success() == false`.
    #[instrument(skip_all, fields(extrinsic = %extrinsic.hash_hex()))]
    pub async fn submit_extrinsic(
        &self,
        extrinsic: &Extrinsic,
        options: SubmitOptions,
    ) -> Result<ExtrinsicReceipt> {
        let extrinsic_hash = request(
            "submit",
            self.config.request_timeout(),
            self.transport.submit(extrinsic.as_bytes()),
        )
        .await?;
        info!(hash = %to_hex(&extrinsic_hash), "Extrinsic submitted");

        let pending = ExtrinsicReceipt::pending(extrinsic_hash, Some(*extrinsic.signer()));
        if !options.waits() {
            return Ok(pending);
        }

        let block = wait_for_block(
            &self.transport,
            extrinsic_hash,
            options.wait_for_finalization,
            self.config.inclusion_timeout(),
        )
        .await?;

        let metadata = self.metadata().await?;
        let snapshot = self.registry.snapshot();
        let codec = ScaleCodec::new(&snapshot, None);
        let receipt = fetch_receipt(
            &self.transport,
            pending,
            block,
            options.wait_for_finalization,
            &metadata,
            &codec,
            self.config.request_timeout(),
        )
        .await?;
        info!(
            block = %to_hex(&block),
            success = receipt.is_success(),
            "Extrinsic outcome"
        );
        Ok(receipt)
    }

    /// [`Self::submit_extrinsic`], abandoned with `Cancelled` when `cancel`
    /// completes first. Abandoning drops the status subscription.
    pub async fn submit_extrinsic_until<C>(
        &self,
        extrinsic: &Extrinsic,
        options: SubmitOptions,
        cancel: C,
    ) -> Result<ExtrinsicReceipt>
    where
        C: Future<Output = ()>,
    {
        tokio::select! {
            receipt = self.submit_extrinsic(extrinsic, options) => receipt,
            _ = cancel => {
                info!(hash = %extrinsic.hash_hex(), "Extrinsic wait cancelled");
                Err(InterfaceError::Cancelled)
            }
        }
    }

    async fn account_nonce(&self, keypair: &Keypair) -> Result<u32> {
        let address = keypair.ss58_address(self.ss58_format().await?)?;
        request(
            "account_nonce",
            self.config.request_timeout(),
            self.transport.account_nonce(&address),
        )
        .await
    }

    async fn genesis_hash(&self) -> Result<Hash> {
        self.genesis_hash
            .get_or_try_init(|| {
                request(
                    "genesis_hash",
                    self.config.request_timeout(),
                    self.transport.genesis_hash(),
                )
            })
            .await
            .copied()
    }

    /// Block number for `block_hash`; `None` if the chain does not know it
    pub async fn get_block_number(&self, block_hash: Hash) -> Result<Option<u64>> {
        request(
            "block_number",
            self.config.request_timeout(),
            self.transport.block_number(block_hash),
        )
        .await
    }

    /// Chain name, fetched once
    pub async fn chain(&self) -> Result<String> {
        self.chain
            .get_or_try_init(|| {
                request(
                    "system_chain",
                    self.config.request_timeout(),
                    self.transport.system_chain(),
                )
            })
            .await
            .cloned()
    }

    /// Chain properties, fetched once
    pub async fn properties(&self) -> Result<ChainProperties> {
        self.properties
            .get_or_try_init(|| {
                request(
                    "system_properties",
                    self.config.request_timeout(),
                    self.transport.system_properties(),
                )
            })
            .await
            .cloned()
    }

    /// Configured format, else the chain's, else generic substrate (42)
    pub async fn ss58_format(&self) -> Result<u16> {
        if let Some(format) = self.config.ss58_format {
            return Ok(format);
        }
        Ok(self
            .properties()
            .await?
            .ss58_format
            .unwrap_or(AddressFormat::Substrate.prefix()))
    }

    pub async fn token_symbol(&self) -> Result<Option<String>> {
        Ok(self.properties().await?.token_symbol)
    }

    pub async fn token_decimals(&self) -> Result<Option<u8>> {
        Ok(self.properties().await?.token_decimals)
    }

    /// Whether `address` is well-formed SS58 for this chain's format
    pub async fn is_valid_ss58_address(&self, address: &str) -> Result<bool> {
        Ok(is_valid_ss58_address(address, Some(self.ss58_format().await?)))
    }

    pub async fn ss58_encode(&self, public_key: &[u8]) -> Result<String> {
        encode_ss58(public_key, self.ss58_format().await?)
    }

    /// Public key of `address`; rejects other networks' formats
    pub async fn ss58_decode(&self, address: &str) -> Result<[u8; 32]> {
        decode_ss58_for_format(address, self.ss58_format().await?)
    }
}
